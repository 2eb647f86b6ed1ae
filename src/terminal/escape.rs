// 窗口尺寸控制序列提取
//
// 前端把 `ESC [ 8 ; <rows> ; <cols> t` 混在键盘输入中发送。这里逐字节扫描，
// 把完整且合法的序列解码成 WindowSize，其余字节原样转发。
// 序列可以在任意位置被读边界切开，未完成的部分保存在 State 中等待下一块数据。

use tracing::trace;

use crate::constants::escape::{MAX_FIELD_DIGITS, RESIZE_PREFIX, RESIZE_SUFFIX};

const ESC: u8 = 0x1b;

/// 终端尺寸
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowSize {
    pub rows: u32,
    pub cols: u32,
}

/// 提取结果，保持原始顺序
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Intercepted {
    /// 需要转发给远端的普通字节
    Data(Vec<u8>),
    /// 解码出的尺寸变化
    Resize(WindowSize),
}

/// 载荷中的一个十进制字段
///
/// 前导零只计数不保存，原始字节可由 `zeros` 个 '0' 加 `digits` 还原。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct Field {
    zeros: usize,
    digits: Vec<u8>,
}

impl Field {
    /// 追加一位数字，有效位数超过 u32 上限时返回 false
    fn push(&mut self, digit: u8) -> bool {
        if digit == b'0' && self.digits.is_empty() {
            self.zeros += 1;
            true
        } else if self.digits.len() < MAX_FIELD_DIGITS {
            self.digits.push(digit);
            true
        } else {
            false
        }
    }

    fn value(&self) -> Option<u32> {
        if self.digits.is_empty() {
            return (self.zeros > 0).then_some(0);
        }
        std::str::from_utf8(&self.digits).ok()?.parse().ok()
    }

    fn write_raw(&self, out: &mut Output) {
        out.data("0".repeat(self.zeros).as_bytes());
        out.data(&self.digits);
    }
}

/// `<rows>;<cols>` 载荷
#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct Payload {
    rows: Field,
    cols: Field,
    /// 已经读到分号
    in_cols: bool,
}

impl Payload {
    /// 接收一个字节，不可能再构成合法载荷时返回 false
    fn push(&mut self, byte: u8) -> bool {
        match byte {
            b'0'..=b'9' if self.in_cols => self.cols.push(byte),
            b'0'..=b'9' => self.rows.push(byte),
            b';' if !self.in_cols => {
                self.in_cols = true;
                true
            }
            _ => false,
        }
    }

    fn window_size(&self) -> Option<WindowSize> {
        if !self.in_cols {
            return None;
        }
        Some(WindowSize {
            rows: self.rows.value()?,
            cols: self.cols.value()?,
        })
    }

    fn write_raw(&self, out: &mut Output) {
        self.rows.write_raw(out);
        if self.in_cols {
            out.data(b";");
            self.cols.write_raw(out);
        }
    }
}

/// 跨读取保留的匹配状态
#[derive(Clone, Debug, PartialEq, Eq, Default)]
enum State {
    #[default]
    Idle,
    /// 已匹配前缀的前 n 个字节（1..前缀长度）
    MatchingPrefix(usize),
    /// 前缀已完整，正在收集载荷
    BufferingPayload(Payload),
}

/// 控制序列提取器
#[derive(Debug, Default)]
pub struct ResizeInterceptor {
    state: State,
}

impl ResizeInterceptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// 处理一块输入
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Intercepted> {
        let mut out = Output::default();
        for &byte in chunk {
            self.step(byte, &mut out);
        }
        out.finish()
    }

    /// 输入结束，未完成的序列原样吐出
    pub fn finish(&mut self) -> Vec<Intercepted> {
        let mut out = Output::default();
        self.release_pending(&mut out);
        out.finish()
    }

    fn step(&mut self, byte: u8, out: &mut Output) {
        match &mut self.state {
            State::Idle => {
                if byte == ESC {
                    self.state = State::MatchingPrefix(1);
                } else {
                    out.data(&[byte]);
                }
            }
            State::MatchingPrefix(matched) => {
                let matched = *matched;
                if byte == RESIZE_PREFIX[matched] {
                    self.state = if matched + 1 == RESIZE_PREFIX.len() {
                        State::BufferingPayload(Payload::default())
                    } else {
                        State::MatchingPrefix(matched + 1)
                    };
                } else {
                    // 前缀不匹配：已吃掉的字节原样转发，当前字节重新扫描
                    self.release_pending(out);
                    self.step(byte, out);
                }
            }
            State::BufferingPayload(payload) => {
                if byte == RESIZE_SUFFIX {
                    let payload = std::mem::take(payload);
                    self.state = State::Idle;
                    match payload.window_size() {
                        Some(size) => {
                            trace!("[Escape] Window size {}x{}", size.rows, size.cols);
                            out.resize(size);
                        }
                        None => {
                            out.data(RESIZE_PREFIX);
                            payload.write_raw(out);
                            out.data(&[RESIZE_SUFFIX]);
                        }
                    }
                } else if !payload.push(byte) {
                    // 不可能再构成合法序列
                    self.release_pending(out);
                    self.step(byte, out);
                }
            }
        }
    }

    /// 把当前挂起的字节原样输出并回到 Idle
    fn release_pending(&mut self, out: &mut Output) {
        match std::mem::take(&mut self.state) {
            State::Idle => {}
            State::MatchingPrefix(matched) => out.data(&RESIZE_PREFIX[..matched]),
            State::BufferingPayload(payload) => {
                out.data(RESIZE_PREFIX);
                payload.write_raw(out);
            }
        }
    }
}

/// 合并相邻的数据片段
#[derive(Default)]
struct Output {
    items: Vec<Intercepted>,
}

impl Output {
    fn data(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        match self.items.last_mut() {
            Some(Intercepted::Data(buf)) => buf.extend_from_slice(bytes),
            _ => self.items.push(Intercepted::Data(bytes.to_vec())),
        }
    }

    fn resize(&mut self, size: WindowSize) {
        self.items.push(Intercepted::Resize(size));
    }

    fn finish(self) -> Vec<Intercepted> {
        self.items
    }
}
