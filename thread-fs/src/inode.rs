//! # inode 层
//!
//! 每个文件一条定长 32 字节的磁盘记录：文件长度、引用计数、访问标志、
//! 11 个直接块编号外加一个一级间接块编号。记录阵列紧随卷头，自 1 号块起。
//!
//! 块映射按偏移顺序走直接表，再走间接块里的编号表；
//! 超出文件长度的指针一律是哨兵。分配是连续的，文件中间不存在空洞。

use crate::block::{read_i16, read_i32, write_i16, write_i32};
use crate::BlockCache;
use crate::BlockId;
use crate::FsError;
use crate::Result;
use crate::{BLOCK_SIZE, DIRECT_COUNT, INODE_SIZE};

/// 一个间接块能容纳的块编号条数
const PTRS_PER_BLOCK: usize = BLOCK_SIZE / 2;
const INODES_PER_BLOCK: usize = BLOCK_SIZE / INODE_SIZE;
/// inode 区自 1 号块起
const INODE_AREA_START: usize = 1;

/// 按 inode 记录的访问仲裁状态，随记录持久化。
/// 数值编码即磁盘编码。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i16)]
pub enum AccessFlag {
    /// 未被任何打开持有
    #[default]
    Unused = 0,
    /// 读打开持有中，无写者排队
    Reading = 1,
    /// 写打开持有中
    Writing = 2,
    /// 当前无人持有，但有写者排在前一个写者之后
    WriterQueued = 3,
    /// 读打开持有中，且有写者等待
    ReadingWriterQueued = 4,
    /// 写打开持有中，且另有写者等待
    WritingWriterQueued = 5,
}

impl AccessFlag {
    fn from_raw(raw: i16) -> Self {
        match raw {
            1 => Self::Reading,
            2 => Self::Writing,
            3 => Self::WriterQueued,
            4 => Self::ReadingWriterQueued,
            5 => Self::WritingWriterQueued,
            _ => Self::Unused,
        }
    }
}

/// 注册一个数据块的结果
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Register {
    Registered,
    /// 直接表已满而间接块尚未建立，调用者需先注册一个间接块
    MissingIndex,
}

/// inode 的内存形态。磁盘上的哨兵编号在这里还原成 `Option`。
#[derive(Debug, Clone, Default)]
pub struct Inode {
    pub length: u32,
    /// 指向本 inode 的打开表项个数
    pub count: i16,
    pub flag: AccessFlag,
    direct: [Option<BlockId>; DIRECT_COUNT],
    indirect: Option<BlockId>,
}

impl Inode {
    /// 从 inode 区读出第 `inum` 条记录
    pub fn load(cache: &BlockCache, inum: usize) -> Result<Self> {
        let mut block = [0u8; BLOCK_SIZE];
        cache.read(BlockId::from(block_of(inum)), &mut block)?;
        let offset = offset_of(inum);
        Ok(Self::decode(&block[offset..offset + INODE_SIZE]))
    }

    /// 把本记录写回 inode 区的第 `inum` 个槽位
    pub fn store(&self, cache: &BlockCache, inum: usize) -> Result<()> {
        let id = BlockId::from(block_of(inum));
        let mut block = [0u8; BLOCK_SIZE];
        cache.read(id, &mut block)?;
        let offset = offset_of(inum);
        self.encode(&mut block[offset..offset + INODE_SIZE]);
        cache.write(id, &block)
    }

    /// 从一条 32 字节记录还原
    pub fn decode(buf: &[u8]) -> Self {
        let mut direct = [None; DIRECT_COUNT];
        for (i, slot) in direct.iter_mut().enumerate() {
            *slot = BlockId::decode16(read_i16(buf, 8 + 2 * i));
        }
        Self {
            length: read_i32(buf, 0).max(0) as u32,
            count: read_i16(buf, 4),
            flag: AccessFlag::from_raw(read_i16(buf, 6)),
            direct,
            indirect: BlockId::decode16(read_i16(buf, 8 + 2 * DIRECT_COUNT)),
        }
    }

    /// 编码进一条 32 字节记录
    pub fn encode(&self, buf: &mut [u8]) {
        write_i32(buf, 0, self.length as i32);
        write_i16(buf, 4, self.count);
        write_i16(buf, 6, self.flag as i16);
        for (i, slot) in self.direct.iter().enumerate() {
            write_i16(buf, 8 + 2 * i, BlockId::encode16(*slot));
        }
        write_i16(buf, 8 + 2 * DIRECT_COUNT, BlockId::encode16(self.indirect));
    }

    /// 求出文件第 `index` 个逻辑块所在的磁盘块。
    /// 直接表与间接表都没有映射时返回 `None`。
    pub(crate) fn target_block(
        &self,
        index: usize,
        cache: &BlockCache,
    ) -> Result<Option<BlockId>> {
        if index < DIRECT_COUNT {
            return Ok(self.direct[index]);
        }
        let Some(indirect) = self.indirect else {
            return Ok(None);
        };
        let slot = index - DIRECT_COUNT;
        if slot >= PTRS_PER_BLOCK {
            return Ok(None);
        }

        let mut block = [0u8; BLOCK_SIZE];
        cache.read(indirect, &mut block)?;
        Ok(BlockId::decode16(read_i16(&block, 2 * slot)))
    }

    /// 把 `id` 注册为文件的第 `index` 个逻辑块。
    /// 槽位已被占用、或前一个直接槽还空着（出现空洞），都视为块映射损坏。
    pub(crate) fn register_block(
        &mut self,
        index: usize,
        id: BlockId,
        cache: &BlockCache,
    ) -> Result<Register> {
        if index < DIRECT_COUNT {
            if self.direct[index].is_some() {
                return Err(FsError::BrokenBlockMap);
            }
            if index > 0 && self.direct[index - 1].is_none() {
                return Err(FsError::BrokenBlockMap);
            }
            self.direct[index] = Some(id);
            return Ok(Register::Registered);
        }

        let Some(indirect) = self.indirect else {
            return Ok(Register::MissingIndex);
        };
        let slot = index - DIRECT_COUNT;
        if slot >= PTRS_PER_BLOCK {
            return Err(FsError::FileTooLarge);
        }

        let mut block = [0u8; BLOCK_SIZE];
        cache.read(indirect, &mut block)?;
        if read_i16(&block, 2 * slot) >= 0 {
            return Err(FsError::BrokenBlockMap);
        }
        write_i16(&mut block, 2 * slot, BlockId::encode16(Some(id)));
        cache.write(indirect, &block)?;
        Ok(Register::Registered)
    }

    /// 建立间接块：要求直接表已全部占用且尚无间接块，
    /// 新块的编号表整体初始化为哨兵。
    pub(crate) fn register_index_block(
        &mut self,
        id: BlockId,
        cache: &BlockCache,
    ) -> Result<()> {
        if self.direct.iter().any(Option::is_none) || self.indirect.is_some() {
            return Err(FsError::BrokenBlockMap);
        }

        let mut block = [0u8; BLOCK_SIZE];
        for offset in (0..BLOCK_SIZE).step_by(2) {
            write_i16(&mut block, offset, -1);
        }
        cache.write(id, &block)?;
        self.indirect = Some(id);
        Ok(())
    }

    /// 摘下间接块，返回其编号与内容，供调用者逐条归还其中的数据块
    pub(crate) fn unregister_index_block(
        &mut self,
        cache: &BlockCache,
    ) -> Result<Option<(BlockId, [u8; BLOCK_SIZE])>> {
        let Some(indirect) = self.indirect.take() else {
            return Ok(None);
        };
        let mut block = [0u8; BLOCK_SIZE];
        cache.read(indirect, &mut block)?;
        Ok(Some((indirect, block)))
    }

    /// 逐个摘下直接块
    pub(crate) fn take_direct_blocks(&mut self) -> impl Iterator<Item = BlockId> + '_ {
        self.direct.iter_mut().filter_map(Option::take)
    }

    /// 遍历一个间接块内容里的全部有效编号
    pub(crate) fn index_entries(block: &[u8]) -> impl Iterator<Item = BlockId> + '_ {
        (0..PTRS_PER_BLOCK).filter_map(|slot| BlockId::decode16(read_i16(block, 2 * slot)))
    }
}

fn block_of(inum: usize) -> usize {
    INODE_AREA_START + inum / INODES_PER_BLOCK
}

fn offset_of(inum: usize) -> usize {
    inum % INODES_PER_BLOCK * INODE_SIZE
}
