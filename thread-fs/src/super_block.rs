//! # 超级块层
//!
//! 0 号块是卷头：卷内总块数、inode 总数、空闲链表头。
//! 空闲块彼此串成单链表：每个空闲块的头 4 字节存下一个空闲块的编号，
//! 链尾写哨兵。分配与回收即链表头的弹出与压入。
//!
//! 链表头在一次调用内既被读又被推进，调用者须将每次调用置于同一临界区。

use crate::block::{read_i32, write_i32};
use crate::BlockCache;
use crate::BlockId;
use crate::FsError;
use crate::Inode;
use crate::Result;
use crate::{BLOCK_SIZE, DEFAULT_INODES, INODE_SIZE};

/// inode 区自 1 号块起
const INODE_AREA_START: usize = 1;

pub struct SuperBlock {
    total_blocks: usize,
    total_inodes: usize,
    /// 空闲链表头，`None` 表示卷已无空闲块
    free_list: Option<BlockId>,
}

impl SuperBlock {
    /// 卷引导：读 0 号块。存储的总块数与设备一致、inode 数为正、
    /// 链表头不小于 2，则信任卷头；否则按缺省 inode 数重新格式化。
    pub fn load(cache: &BlockCache, total_blocks: usize) -> Result<Self> {
        let mut buf = [0u8; BLOCK_SIZE];
        cache.read(BlockId::from(0), &mut buf)?;

        let stored_blocks = read_i32(&buf, 0);
        let stored_inodes = read_i32(&buf, 4);
        let free_head = read_i32(&buf, 8);

        if stored_blocks as usize == total_blocks && stored_inodes > 0 && free_head >= 2 {
            return Ok(Self {
                total_blocks,
                total_inodes: stored_inodes as usize,
                free_list: BlockId::decode32(free_head),
            });
        }

        log::info!("invalid volume header, formatting {} blocks", total_blocks);
        let mut sb = Self {
            total_blocks,
            total_inodes: 0,
            free_list: None,
        };
        sb.format(DEFAULT_INODES, cache)?;
        Ok(sb)
    }

    pub fn total_blocks(&self) -> usize {
        self.total_blocks
    }

    pub fn total_inodes(&self) -> usize {
        self.total_inodes
    }

    /// 第一个数据块的编号；其之前是卷头与 inode 区
    pub fn first_data_block(&self) -> usize {
        2 + (self.total_inodes * INODE_SIZE).div_ceil(BLOCK_SIZE)
    }

    /// 格式化：写入 `inode_count` 条未使用的 inode 记录，
    /// 把 inode 区之后的所有块串成空闲链表，最后持久化卷头。
    pub fn format(&mut self, inode_count: usize, cache: &BlockCache) -> Result<()> {
        self.total_inodes = inode_count;

        // inode 区整块整块地铺上空记录
        let empty = Inode::default();
        let mut block = [0u8; BLOCK_SIZE];
        for offset in (0..BLOCK_SIZE).step_by(INODE_SIZE) {
            empty.encode(&mut block[offset..offset + INODE_SIZE]);
        }
        let inode_blocks = (inode_count * INODE_SIZE).div_ceil(BLOCK_SIZE);
        for id in INODE_AREA_START..INODE_AREA_START + inode_blocks {
            cache.write(BlockId::from(id), &block)?;
        }

        // 数据块串链：每块头 4 字节指向后继，链尾写哨兵
        let first_data = self.first_data_block();
        for id in first_data..self.total_blocks {
            let next = (id + 1 < self.total_blocks).then(|| BlockId::from(id + 1));
            let mut block = [0u8; BLOCK_SIZE];
            write_i32(&mut block, 0, BlockId::encode32(next));
            cache.write(BlockId::from(id), &block)?;
        }
        self.free_list = (first_data < self.total_blocks).then(|| BlockId::from(first_data));

        self.sync(cache)
    }

    /// 弹出链表头。读出头块记下后继，抹掉头块里的链接字段再写回，
    /// 最后把头块交给调用者。链表为空时返回 `None`。
    pub fn get_free_block(&mut self, cache: &BlockCache) -> Result<Option<BlockId>> {
        let Some(head) = self.free_list else {
            return Ok(None);
        };

        let mut block = [0u8; BLOCK_SIZE];
        cache.read(head, &mut block)?;
        self.free_list = BlockId::decode32(read_i32(&block, 0));
        write_i32(&mut block, 0, 0);
        cache.write(head, &block)?;
        log::trace!("alloc {:?}, free list head -> {:?}", head, self.free_list);
        Ok(Some(head))
    }

    /// 把一个块压回链表头。整块清零，链接字段指向旧表头。
    pub fn return_block(&mut self, id: BlockId, cache: &BlockCache) -> Result<()> {
        if usize::from(id) < self.first_data_block() || usize::from(id) >= self.total_blocks {
            return Err(FsError::BrokenBlockMap);
        }
        let mut block = [0u8; BLOCK_SIZE];
        write_i32(&mut block, 0, BlockId::encode32(self.free_list));
        cache.write(id, &block)?;
        self.free_list = Some(id);
        Ok(())
    }

    /// 把卷头持久化到 0 号块
    pub fn sync(&self, cache: &BlockCache) -> Result<()> {
        let mut block = [0u8; BLOCK_SIZE];
        write_i32(&mut block, 0, self.total_blocks as i32);
        write_i32(&mut block, 4, self.total_inodes as i32);
        write_i32(&mut block, 8, BlockId::encode32(self.free_list));
        cache.write(BlockId::from(0), &block)
    }
}
