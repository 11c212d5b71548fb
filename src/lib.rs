pub mod api;
pub mod core;

pub use api::monitor::StreamOcrMonitor;

pub fn init_logging() {
    #[cfg(target_os = "android")]
    {
        android_logger::init_once(
            android_logger::Config::default()
                .with_max_level(log::LevelFilter::Debug)
                .with_tag("stream_ocr"),
        );
    }

    #[cfg(not(target_os = "android"))]
    {
        // 非 Android 平台由宿主程序安装 logger
    }
}
