use super::config::StreamConfig;

/// 构建解码子进程的命令行：第一个元素是可执行文件，其余为参数
pub trait CommandBuilder: Send + Sync {
    fn build_command(&self) -> Vec<String>;
}

/// FFmpeg 命令描述
#[derive(Debug, Clone, PartialEq)]
pub struct FfmpegCommand {
    pub executable: String,
    pub hide_banner: bool,
    /// quiet / error / warning / info / debug
    pub log_level: String,
    /// 输入参数，按插入顺序输出
    pub input_flags: Vec<(String, String)>,
    pub input_source: String,
    pub video_filters: Vec<String>,
    pub output_flags: Vec<(String, String)>,
    pub output_format: String,
    pub output_target: String,
}

impl Default for FfmpegCommand {
    fn default() -> Self {
        Self {
            executable: "ffmpeg".to_string(),
            hide_banner: true,
            log_level: "error".to_string(),
            input_flags: Vec::new(),
            input_source: String::new(),
            video_filters: Vec::new(),
            output_flags: Vec::new(),
            output_format: String::new(),
            output_target: "-".to_string(),
        }
    }
}

impl FfmpegCommand {
    /// 直播流抽帧：MJPEG 经 stdout 输出
    pub fn live_capture(config: &StreamConfig) -> Self {
        let mut command = Self {
            executable: config.ffmpeg_path.clone(),
            log_level: config.log_level.clone(),
            input_source: config.stream_url.clone(),
            output_format: "image2pipe".to_string(),
            ..Default::default()
        };

        if config.no_buffer {
            command.set_input_flag("fflags", "nobuffer");
        }
        command.set_reconnect(config.reconnect);
        command.video_filters = vec![
            format!("fps={}", config.fps),
            format!("scale={}:-2", config.scale_width),
        ];
        if let Some(max_frames) = config.max_frames {
            command.set_output_flag("vframes", &max_frames.to_string());
        }
        command.set_output_flag("vcodec", "mjpeg");
        command
    }

    pub fn set_input_flag(&mut self, key: &str, value: &str) {
        set_flag(&mut self.input_flags, key, value);
    }

    pub fn remove_input_flag(&mut self, key: &str) {
        self.input_flags.retain(|(k, _)| k != key);
    }

    pub fn set_output_flag(&mut self, key: &str, value: &str) {
        set_flag(&mut self.output_flags, key, value);
    }

    pub fn set_reconnect(&mut self, enable: bool) {
        if enable {
            self.set_input_flag("reconnect", "1");
        } else {
            self.remove_input_flag("reconnect");
        }
    }

    pub fn build(&self) -> Vec<String> {
        let mut cmd = vec![self.executable.clone()];

        if self.hide_banner {
            cmd.push("-hide_banner".to_string());
        }
        cmd.push("-loglevel".to_string());
        cmd.push(self.log_level.clone());

        for (key, value) in &self.input_flags {
            cmd.push(format!("-{}", key));
            cmd.push(value.clone());
        }

        if !self.input_source.is_empty() {
            cmd.push("-i".to_string());
            cmd.push(self.input_source.clone());
        }

        if !self.video_filters.is_empty() {
            cmd.push("-vf".to_string());
            cmd.push(self.video_filters.join(","));
        }

        if !self.output_format.is_empty() {
            cmd.push("-f".to_string());
            cmd.push(self.output_format.clone());
        }

        for (key, value) in &self.output_flags {
            cmd.push(format!("-{}", key));
            cmd.push(value.clone());
        }

        cmd.push(self.output_target.clone());
        cmd
    }
}

impl CommandBuilder for FfmpegCommand {
    fn build_command(&self) -> Vec<String> {
        self.build()
    }
}

fn set_flag(flags: &mut Vec<(String, String)>, key: &str, value: &str) {
    match flags.iter_mut().find(|(k, _)| k == key) {
        Some(entry) => entry.1 = value.to_string(),
        None => flags.push((key.to_string(), value.to_string())),
    }
}
