// SSH 会话管理
// 连接成功后的会话对象，负责打开交互式 Shell 并转发数据

use std::future::Future;

use russh::client::{Handle, Msg};
use russh::ChannelMsg;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::error::SshError;
use super::handler::SshClientHandler;
use crate::constants::terminal;
use crate::models::settings::TerminalSettings;
use crate::terminal::{InputEvent, InputItem};

/// PTY 请求参数
#[derive(Clone, Debug)]
pub struct PtyRequest {
    /// 终端类型
    pub term: String,
    /// 列数
    pub col_width: u32,
    /// 行数
    pub row_height: u32,
    /// 终端模式
    pub modes: Vec<(russh::Pty, u32)>,
}

impl Default for PtyRequest {
    fn default() -> Self {
        Self {
            term: terminal::TERM.to_string(),
            col_width: terminal::COLS,
            row_height: terminal::ROWS,
            modes: default_modes(),
        }
    }
}

impl From<&TerminalSettings> for PtyRequest {
    fn from(settings: &TerminalSettings) -> Self {
        Self {
            term: settings.term.clone(),
            col_width: settings.cols,
            row_height: settings.rows,
            modes: default_modes(),
        }
    }
}

/// 回显开启，输入输出速率 14400 baud
fn default_modes() -> Vec<(russh::Pty, u32)> {
    vec![
        (russh::Pty::ECHO, 1),
        (russh::Pty::TTY_OP_ISPEED, terminal::BAUD),
        (russh::Pty::TTY_OP_OSPEED, terminal::BAUD),
    ]
}

/// SSH 会话（连接成功后）
pub struct SshSession {
    /// russh Handle
    handle: Handle<SshClientHandler>,
    /// 跳板机连接，需与会话同生命周期
    _jump: Option<Handle<SshClientHandler>>,
    /// 服务器主机名
    host: String,
    /// 用户名
    username: String,
}

impl SshSession {
    /// 创建新的会话
    pub fn new(
        handle: Handle<SshClientHandler>,
        jump: Option<Handle<SshClientHandler>>,
        host: String,
        username: String,
    ) -> Self {
        Self {
            handle,
            _jump: jump,
            host,
            username,
        }
    }

    /// 获取主机名
    pub fn host(&self) -> &str {
        &self.host
    }

    /// 获取用户名
    pub fn username(&self) -> &str {
        &self.username
    }

    /// 打开终端 Shell 通道
    pub async fn open_terminal(&self, pty: PtyRequest) -> Result<InteractiveSession, SshError> {
        let channel = self.handle.channel_open_session().await?;

        channel
            .request_pty(
                false,
                &pty.term,
                pty.col_width,
                pty.row_height,
                0,
                0,
                &pty.modes,
            )
            .await
            .map_err(|e| SshError::Channel(format!("failed to request pty: {}", e)))?;

        channel
            .request_shell(false)
            .await
            .map_err(|e| SshError::Channel(format!("failed to start shell: {}", e)))?;

        debug!(
            "[SSH] Shell started on {} ({}x{} {})",
            self.host, pty.row_height, pty.col_width, pty.term
        );
        Ok(InteractiveSession { channel })
    }
}

/// 交互式会话用到的通道操作
pub trait ShellChannel {
    /// 下一条远端消息，通道关闭后为 None
    fn wait(&mut self) -> impl Future<Output = Option<ChannelMsg>>;
    fn data(&self, data: &[u8]) -> impl Future<Output = Result<(), russh::Error>>;
    fn window_change(&self, cols: u32, rows: u32)
        -> impl Future<Output = Result<(), russh::Error>>;
    fn eof(&self) -> impl Future<Output = Result<(), russh::Error>>;
}

impl ShellChannel for russh::Channel<Msg> {
    fn wait(&mut self) -> impl Future<Output = Option<ChannelMsg>> {
        russh::Channel::<Msg>::wait(self)
    }

    fn data(&self, data: &[u8]) -> impl Future<Output = Result<(), russh::Error>> {
        russh::Channel::<Msg>::data(self, data)
    }

    fn window_change(
        &self,
        cols: u32,
        rows: u32,
    ) -> impl Future<Output = Result<(), russh::Error>> {
        russh::Channel::<Msg>::window_change(self, cols, rows, 0, 0)
    }

    fn eof(&self) -> impl Future<Output = Result<(), russh::Error>> {
        russh::Channel::<Msg>::eof(self)
    }
}

/// 交互式 Shell 通道
pub struct InteractiveSession<C = russh::Channel<Msg>> {
    channel: C,
}

impl<C: ShellChannel> InteractiveSession<C> {
    /// 转发数据直到远端关闭通道或本地输入出错
    ///
    /// 远端标准输出写入 `stdout`，扩展数据 1 写入 `stderr`；
    /// 返回远端退出码，远端未报告时为 None。
    pub async fn run<O, E>(
        mut self,
        mut input: mpsc::Receiver<InputItem>,
        mut stdout: O,
        mut stderr: E,
    ) -> Result<Option<u32>, SshError>
    where
        O: AsyncWrite + Unpin,
        E: AsyncWrite + Unpin,
    {
        let mut exit_status = None;
        let mut input_open = true;

        loop {
            tokio::select! {
                msg = self.channel.wait() => match msg {
                    Some(ChannelMsg::Data { data }) => {
                        stdout.write_all(&data).await?;
                        stdout.flush().await?;
                    }
                    Some(ChannelMsg::ExtendedData { data, ext: 1 }) => {
                        stderr.write_all(&data).await?;
                        stderr.flush().await?;
                    }
                    Some(ChannelMsg::ExitStatus { exit_status: status }) => {
                        debug!("[SSH] Remote exit status {}", status);
                        exit_status = Some(status);
                    }
                    Some(ChannelMsg::ExitSignal { signal_name, .. }) => {
                        warn!("[SSH] Remote process killed by signal {:?}", signal_name);
                    }
                    Some(ChannelMsg::Eof) => debug!("[SSH] Remote sent EOF"),
                    Some(ChannelMsg::Close) | None => break,
                    Some(_) => {}
                },
                item = input.recv(), if input_open => match item {
                    Some(Ok(InputEvent::Data(data))) => {
                        self.channel.data(&data).await?;
                    }
                    Some(Ok(InputEvent::Resize(size))) => {
                        debug!("[SSH] Window change {}x{}", size.rows, size.cols);
                        self.channel
                            .window_change(size.cols, size.rows)
                            .await
                            .map_err(|e| SshError::Channel(format!("failed to resize: {}", e)))?;
                    }
                    Some(Ok(InputEvent::Eof)) | None => {
                        input_open = false;
                        self.channel.eof().await?;
                    }
                    Some(Err(e)) => {
                        warn!("[SSH] Local input failed, closing session: {}", e);
                        return Err(e.into());
                    }
                },
            }
        }

        info!("[SSH] Session closed");
        Ok(exit_status)
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::constants::INPUT_QUEUE_CAPACITY;
    use crate::ssh::error::ForwardError;
    use crate::terminal::escape::WindowSize;
    use crate::terminal::forward_input;

    #[derive(Clone, Debug, PartialEq, Eq)]
    enum Call {
        Data(Vec<u8>),
        WindowChange { cols: u32, rows: u32 },
        Eof,
    }

    /// 远端消息由测试注入，本地操作记录下来
    struct FakeChannel {
        remote: mpsc::UnboundedReceiver<ChannelMsg>,
        calls: Arc<Mutex<Vec<Call>>>,
    }

    impl FakeChannel {
        fn record(&self, call: Call) -> impl Future<Output = Result<(), russh::Error>> {
            self.calls.lock().unwrap().push(call);
            std::future::ready(Ok(()))
        }
    }

    impl ShellChannel for FakeChannel {
        fn wait(&mut self) -> impl Future<Output = Option<ChannelMsg>> {
            self.remote.recv()
        }

        fn data(&self, data: &[u8]) -> impl Future<Output = Result<(), russh::Error>> {
            self.record(Call::Data(data.to_vec()))
        }

        fn window_change(
            &self,
            cols: u32,
            rows: u32,
        ) -> impl Future<Output = Result<(), russh::Error>> {
            self.record(Call::WindowChange { cols, rows })
        }

        fn eof(&self) -> impl Future<Output = Result<(), russh::Error>> {
            self.record(Call::Eof)
        }
    }

    fn fake_session() -> (
        InteractiveSession<FakeChannel>,
        mpsc::UnboundedSender<ChannelMsg>,
        Arc<Mutex<Vec<Call>>>,
    ) {
        let (remote_tx, remote) = mpsc::unbounded_channel();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let channel = FakeChannel {
            remote,
            calls: calls.clone(),
        };
        (InteractiveSession { channel }, remote_tx, calls)
    }

    #[tokio::test]
    async fn test_input_read_error_ends_session() {
        let (session, _remote_tx, calls) = fake_session();
        let reader = tokio_test::io::Builder::new()
            .read(b"ls")
            .read_error(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
            .build();
        let (tx, rx) = mpsc::channel(INPUT_QUEUE_CAPACITY);
        tokio::spawn(forward_input(reader, tx));

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let err = session.run(rx, &mut stdout, &mut stderr).await.unwrap_err();

        assert!(matches!(err, SshError::Forward(ForwardError::Read(_))));
        // 远端没有收到 EOF，会话直接结束
        assert_eq!(*calls.lock().unwrap(), vec![Call::Data(b"ls".to_vec())]);
    }

    #[tokio::test]
    async fn test_input_events_reach_channel_and_exit_status_is_returned() {
        let (session, remote_tx, calls) = fake_session();
        let (tx, rx) = mpsc::channel(INPUT_QUEUE_CAPACITY);
        tx.send(Ok(InputEvent::Data(b"exit\r".to_vec()))).await.unwrap();
        tx.send(Ok(InputEvent::Resize(WindowSize { rows: 50, cols: 132 })))
            .await
            .unwrap();
        tx.send(Ok(InputEvent::Eof)).await.unwrap();

        let remote = async {
            while calls.lock().unwrap().len() < 3 {
                tokio::task::yield_now().await;
            }
            remote_tx.send(ChannelMsg::Eof).unwrap();
            remote_tx.send(ChannelMsg::ExitStatus { exit_status: 3 }).unwrap();
            remote_tx.send(ChannelMsg::Close).unwrap();
        };

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let (result, ()) = tokio::join!(session.run(rx, &mut stdout, &mut stderr), remote);

        assert_eq!(result.unwrap(), Some(3));
        assert_eq!(
            *calls.lock().unwrap(),
            vec![
                Call::Data(b"exit\r".to_vec()),
                Call::WindowChange { cols: 132, rows: 50 },
                Call::Eof,
            ]
        );
        drop(tx);
    }

    #[tokio::test]
    async fn test_remote_close_without_status() {
        let (session, remote_tx, calls) = fake_session();
        let (_tx, rx) = mpsc::channel(INPUT_QUEUE_CAPACITY);
        remote_tx.send(ChannelMsg::Close).unwrap();

        let result = session
            .run(rx, tokio::io::sink(), tokio::io::sink())
            .await
            .unwrap();

        assert_eq!(result, None);
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_default_pty_request() {
        let pty = PtyRequest::default();
        assert_eq!(pty.term, "xterm-256color");
        assert_eq!((pty.row_height, pty.col_width), (24, 80));
        assert_eq!(
            pty.modes,
            vec![
                (russh::Pty::ECHO, 1),
                (russh::Pty::TTY_OP_ISPEED, 14400),
                (russh::Pty::TTY_OP_OSPEED, 14400),
            ]
        );
    }

    #[test]
    fn test_pty_request_from_settings() {
        let settings = TerminalSettings {
            term: "vt100".to_string(),
            rows: 40,
            cols: 120,
        };
        let pty = PtyRequest::from(&settings);
        assert_eq!(pty.term, "vt100");
        assert_eq!((pty.row_height, pty.col_width), (40, 120));
    }
}
