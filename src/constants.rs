// 全局默认值常量

/// 未指定用户名时使用的默认用户
pub const DEFAULT_USER: &str = "root";

/// SSH 默认端口
pub const DEFAULT_SSH_PORT: u16 = 22;

/// 连接超时（秒）
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// 心跳间隔（秒）
pub const DEFAULT_KEEPALIVE_SECS: u64 = 60;

/// 读写缓冲区大小
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

/// 本地输入队列长度，远端写入较慢时读取端等待
pub const INPUT_QUEUE_CAPACITY: usize = 64;

/// 终端默认参数
pub mod terminal {
    pub const TERM: &str = "xterm-256color";
    pub const ROWS: u32 = 24;
    pub const COLS: u32 = 80;
    /// 输入/输出波特率
    pub const BAUD: u32 = 14400;
}

/// 嵌入在键盘输入流中的窗口尺寸控制序列：ESC [ 8 ; <rows> ; <cols> t
pub mod escape {
    pub const RESIZE_PREFIX: &[u8] = b"\x1b[8;";
    pub const RESIZE_SUFFIX: u8 = b't';
    /// 单个字段的最大有效位数（u32::MAX 为 10 位），前导零不计
    pub const MAX_FIELD_DIGITS: usize = 10;
}
