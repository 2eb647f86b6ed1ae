// Terminal 模块 - 本地输入流处理

pub mod escape;
pub mod pipe;

pub use pipe::{forward_input, InputEvent, InputItem};
