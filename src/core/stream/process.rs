//! 解码子进程
//!
//! `DecoderProcess` 拥有子进程句柄，析构时保证进程被结束（包括 panic 路径）。
//! 采集线程与控制器通过 `ProcessSlot` 共享同一个句柄：谁先取出谁负责结束进程。

use super::error::StreamError;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::io::{BufRead, BufReader, ErrorKind};
use std::process::{Child, ChildStderr, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

pub type ProcessSlot = Arc<Mutex<Option<DecoderProcess>>>;

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

pub struct DecoderProcess {
    child: Child,
    pid: u32,
    program: String,
}

impl DecoderProcess {
    /// 启动子进程，stdout 以管道形式交给调用方，stderr 由后台线程排空
    pub fn spawn(argv: &[String]) -> Result<(Self, ChildStdout), StreamError> {
        let (program, args) = argv.split_first().ok_or_else(|| StreamError::Spawn {
            program: String::new(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"),
        })?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| StreamError::Spawn {
                program: program.clone(),
                source,
            })?;

        let pid = child.id();
        let stdout = match child.stdout.take() {
            Some(stdout) => stdout,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(StreamError::StdoutUnavailable);
            }
        };
        if let Some(stderr) = child.stderr.take() {
            spawn_stderr_drain(stderr, program.clone());
        }

        info!("✅ 解码进程已启动: {} (pid {})", program, pid);
        Ok((
            Self {
                child,
                pid,
                program: program.clone(),
            },
            stdout,
        ))
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// 进程已退出时返回退出状态
    pub fn try_wait(&mut self) -> Option<ExitStatus> {
        match self.child.try_wait() {
            Ok(status) => status,
            Err(e) => {
                warn!("⚠️ 查询解码进程状态失败: {}", e);
                None
            }
        }
    }

    pub fn is_running(&mut self) -> bool {
        self.try_wait().is_none()
    }

    /// 先发送终止信号，超时后强制 kill
    pub fn terminate(mut self, timeout: Duration) {
        self.terminate_in_place(timeout);
    }

    fn terminate_in_place(&mut self, timeout: Duration) {
        if let Some(status) = self.try_wait() {
            debug!("解码进程 {} 已退出: {}", self.pid, status);
            return;
        }

        self.send_terminate();
        let start = Instant::now();
        while start.elapsed() < timeout {
            if let Some(status) = self.try_wait() {
                info!("🛑 解码进程 {} 已退出: {}", self.pid, status);
                return;
            }
            thread::sleep(EXIT_POLL_INTERVAL);
        }

        warn!(
            "⚠️ 解码进程 {} 在 {:?} 内未退出，强制结束",
            self.pid, timeout
        );
        let _ = self.child.kill();
        let _ = self.child.wait();
    }

    #[cfg(unix)]
    fn send_terminate(&mut self) {
        // SAFETY: pid 来自仍未被回收的子进程
        let rc = unsafe { libc::kill(self.pid as libc::pid_t, libc::SIGTERM) };
        if rc != 0 {
            debug!("SIGTERM 发送失败 (pid {}): {}", self.pid, std::io::Error::last_os_error());
        }
    }

    #[cfg(not(unix))]
    fn send_terminate(&mut self) {
        let _ = self.child.kill();
    }
}

impl Drop for DecoderProcess {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            debug!("🗑️ 释放解码进程 {} ({})", self.pid, self.program);
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// 从共享槽位取出进程并结束；槽位为空时什么都不做
pub fn terminate_slot(slot: &ProcessSlot, timeout: Duration) -> bool {
    let process = slot.lock().take();
    match process {
        Some(process) => {
            process.terminate(timeout);
            true
        }
        None => false,
    }
}

/// 持续读取 stderr 直到 EOF；按字节切行，非 UTF-8 内容不会中断排空
fn spawn_stderr_drain(stderr: ChildStderr, program: String) {
    let result = thread::Builder::new()
        .name("decoder-stderr".to_string())
        .spawn(move || {
            let mut reader = BufReader::new(stderr);
            let mut line = Vec::new();
            loop {
                line.clear();
                match reader.read_until(b'\n', &mut line) {
                    Ok(0) => break,
                    Ok(_) => {
                        let text = String::from_utf8_lossy(&line);
                        let text = text.trim();
                        if !text.is_empty() {
                            warn!("{}: {}", program, text);
                        }
                    }
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => {
                        warn!("⚠️ 读取 {} stderr 失败: {}", program, e);
                        break;
                    }
                }
            }
        });
    if let Err(e) = result {
        warn!("⚠️ 无法启动 stderr 排空线程: {}", e);
    }
}
