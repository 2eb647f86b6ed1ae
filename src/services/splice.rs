// 文件原地拼接
// 用新内容替换文件中的一段字节区间，区间之后的内容按块平移，不整体重写文件

use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};

use crate::models::Span;

/// 支持定位读写和截断的存储
pub trait SpliceTarget: Read + Write + Seek {
    /// 当前总长度
    fn byte_len(&mut self) -> io::Result<u64>;
    /// 截断（或以零字节扩展）到指定长度
    fn truncate_to(&mut self, len: u64) -> io::Result<()>;
}

impl SpliceTarget for File {
    fn byte_len(&mut self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

impl SpliceTarget for Cursor<Vec<u8>> {
    fn byte_len(&mut self) -> io::Result<u64> {
        Ok(self.get_ref().len() as u64)
    }

    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.get_mut().resize(len as usize, 0);
        Ok(())
    }
}

/// 调整 `span` 的容量为 `required` 字节
///
/// 变长时从尾部向前逐块后移，变短时从前向后逐块前移再截断，
/// 保证每一块在被覆盖之前已经读出。`buf_size` 只影响性能，不影响结果。
pub fn make_room<T: SpliceTarget>(
    target: &mut T,
    span: Span,
    required: u64,
    buf_size: usize,
) -> io::Result<()> {
    let current = span.len();
    if required == current {
        return Ok(());
    }

    let size = target.byte_len()?;
    if span.end > size {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "span {}..{} lies outside file of {} bytes",
                span.start, span.end, size
            ),
        ));
    }

    let mut buf = vec![0u8; buf_size.max(1)];

    if required > current {
        let delta = required - current;
        let mut end = size;
        while end > span.end {
            let start = end.saturating_sub(buf.len() as u64).max(span.end);
            let n = (end - start) as usize;

            target.seek(SeekFrom::Start(start))?;
            target.read_exact(&mut buf[..n])?;
            target.seek(SeekFrom::Start(start + delta))?;
            target.write_all(&buf[..n])?;

            end = start;
        }
    } else {
        let delta = current - required;
        let mut start = span.end;
        while start < size {
            let n = (size - start).min(buf.len() as u64) as usize;

            target.seek(SeekFrom::Start(start))?;
            target.read_exact(&mut buf[..n])?;
            target.seek(SeekFrom::Start(start - delta))?;
            target.write_all(&buf[..n])?;

            start += n as u64;
        }

        // 去掉尾部残留的旧字节
        target.truncate_to(size - delta)?;
    }

    Ok(())
}

/// 用 `replacement` 替换 `span`
pub fn splice<T: SpliceTarget>(
    target: &mut T,
    span: Span,
    replacement: &[u8],
    buf_size: usize,
) -> io::Result<()> {
    make_room(target, span, replacement.len() as u64, buf_size)?;
    target.seek(SeekFrom::Start(span.start))?;
    target.write_all(replacement)?;
    target.flush()
}
