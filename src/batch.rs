//! 分批：按固定大小切分有序序列，两个上限都由单笔交易的消息大小决定。

/// 单笔 ALT 扩展交易最多写入的地址数。
pub const EXTEND_CHUNK_SIZE: usize = 30;
/// 单笔转账交易最多包含的转账指令数（借助 ALT 压缩账户引用）。
pub const TRANSFER_CHUNK_SIZE: usize = 55;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLimits {
    pub extend: usize,
    pub transfer: usize,
}

impl Default for ChunkLimits {
    fn default() -> Self {
        Self {
            extend: EXTEND_CHUNK_SIZE,
            transfer: TRANSFER_CHUNK_SIZE,
        }
    }
}

impl ChunkLimits {
    /// 大小为 0 的配置按 1 处理。
    pub fn new(extend: usize, transfer: usize) -> Self {
        Self {
            extend: extend.max(1),
            transfer: transfer.max(1),
        }
    }
}

pub fn chunk<T: Clone>(items: &[T], size: usize) -> Vec<Vec<T>> {
    items.chunks(size.max(1)).map(<[T]>::to_vec).collect()
}

pub fn chunk_count(len: usize, size: usize) -> usize {
    len.div_ceil(size.max(1))
}
