use derive_more::{From, Into};

/// 块编号。磁盘上以带符号整数存储，`-1` 表示「未使用」；
/// 内存中缺省值一律用 `Option<BlockId>` 表达。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From, Into)]
#[repr(transparent)]
pub struct BlockId(usize);

impl BlockId {
    /// 间接块与 inode 直接表里的 16 位磁盘编码
    pub(crate) fn decode16(raw: i16) -> Option<Self> {
        (raw >= 0).then(|| Self(raw as usize))
    }

    pub(crate) fn encode16(id: Option<Self>) -> i16 {
        id.map_or(-1, |id| id.0 as i16)
    }

    /// 空闲链表与卷头里的 32 位磁盘编码
    pub(crate) fn decode32(raw: i32) -> Option<Self> {
        (raw >= 0).then(|| Self(raw as usize))
    }

    pub(crate) fn encode32(id: Option<Self>) -> i32 {
        id.map_or(-1, |id| id.0 as i32)
    }
}

// 磁盘字节序一律小端

pub(crate) fn read_i32(buf: &[u8], offset: usize) -> i32 {
    i32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap())
}

pub(crate) fn write_i32(buf: &mut [u8], offset: usize, value: i32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

pub(crate) fn read_i16(buf: &[u8], offset: usize) -> i16 {
    i16::from_le_bytes(buf[offset..offset + 2].try_into().unwrap())
}

pub(crate) fn write_i16(buf: &mut [u8], offset: usize, value: i16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}
