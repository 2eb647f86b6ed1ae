// 本地输入转发
// 从 stdin 读取按键，剥离窗口尺寸序列后交给会话循环

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tracing::debug;

use super::escape::{Intercepted, ResizeInterceptor, WindowSize};
use crate::constants::DEFAULT_BUFFER_SIZE;
use crate::ssh::error::ForwardError;

/// 发往会话循环的输入事件
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputEvent {
    /// 写入远端的数据
    Data(Vec<u8>),
    /// 调整远端 PTY 尺寸
    Resize(WindowSize),
    /// 本地输入结束
    Eof,
}

/// 输入队列中的一项，读取失败时为 Err
pub type InputItem = Result<InputEvent, ForwardError>;

impl From<Intercepted> for InputEvent {
    fn from(item: Intercepted) -> Self {
        match item {
            Intercepted::Data(data) => Self::Data(data),
            Intercepted::Resize(size) => Self::Resize(size),
        }
    }
}

/// 持续读取 `reader` 直到 EOF 或出错
///
/// 读取错误通过队列交给会话循环，由它结束会话。
pub async fn forward_input<R>(reader: R, sender: mpsc::Sender<InputItem>)
where
    R: AsyncRead + Unpin,
{
    match pump(reader, &sender).await {
        Ok(()) => debug!("[Pipe] Local input reached EOF"),
        Err(ForwardError::Closed) => debug!("[Pipe] Session closed before input ended"),
        Err(e) => {
            // 会话已退出时无人接收，忽略即可
            let _ = sender.send(Err(e)).await;
        }
    }
}

async fn pump<R>(mut reader: R, sender: &mpsc::Sender<InputItem>) -> Result<(), ForwardError>
where
    R: AsyncRead + Unpin,
{
    let mut interceptor = ResizeInterceptor::new();
    let mut buf = vec![0u8; DEFAULT_BUFFER_SIZE];

    loop {
        let n = reader.read(&mut buf).await.map_err(ForwardError::Read)?;
        if n == 0 {
            break;
        }
        for item in interceptor.feed(&buf[..n]) {
            send(sender, item.into()).await?;
        }
    }

    // 残留的半截序列按普通数据发送
    for item in interceptor.finish() {
        send(sender, item.into()).await?;
    }
    send(sender, InputEvent::Eof).await
}

async fn send(sender: &mpsc::Sender<InputItem>, event: InputEvent) -> Result<(), ForwardError> {
    sender
        .send(Ok(event))
        .await
        .map_err(|_| ForwardError::Closed)
}
