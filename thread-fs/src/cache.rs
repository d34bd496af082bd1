//! # 块缓存层
//!
//! 定长的内存缓冲池，挡在裸设备之前。淘汰采用二次机会（时钟）策略，
//! 修改过的块打上脏位，直到被淘汰或显式 `sync`/`flush` 时才写回设备。
//!
//! 缓冲池与时钟指针是共享可变状态，因此所有操作互相串行：
//! 同一时刻至多执行一个缓存操作。

use std::sync::{Arc, Mutex};

use block_dev::BlockDevice;

use crate::BlockId;
use crate::DataBlock;
use crate::Result;
use crate::BLOCK_SIZE;

pub struct BlockCache {
    dev: Arc<dyn BlockDevice>,
    pool: Mutex<Pool>,
}

struct Pool {
    slots: Vec<Slot>,
    /// 上一次淘汰所在的槽位，时钟扫描从它的下一格开始
    victim: usize,
}

struct Slot {
    /// 当前驻留的块编号，`None` 表示空槽
    frame: Option<BlockId>,
    /// 最近使用位
    referenced: bool,
    /// 脏位：内存内容尚未落到设备
    dirty: bool,
    data: DataBlock,
}

impl Slot {
    fn empty() -> Self {
        Self {
            frame: None,
            referenced: false,
            dirty: false,
            data: [0; BLOCK_SIZE],
        }
    }

    /// 脏槽先写回设备再清脏位；干净槽与空槽不动
    fn write_back(&mut self, dev: &Arc<dyn BlockDevice>) -> Result<()> {
        if let Some(frame) = self.frame {
            if self.dirty {
                dev.write_block(frame.into(), &self.data)?;
                self.dirty = false;
            }
        }
        Ok(())
    }
}

impl BlockCache {
    pub fn new(dev: Arc<dyn BlockDevice>, capacity: usize) -> Self {
        assert!(capacity > 0);
        Self {
            dev,
            pool: Mutex::new(Pool {
                slots: (0..capacity).map(|_| Slot::empty()).collect(),
                victim: 0,
            }),
        }
    }

    /// 经缓存读出一个块。命中时不触碰设备。
    pub fn read(&self, block_id: BlockId, buf: &mut [u8]) -> Result<()> {
        assert_eq!(buf.len(), BLOCK_SIZE);
        let mut pool = self.pool.lock().unwrap();

        if let Some(slot) = pool.slots.iter_mut().find(|s| s.frame == Some(block_id)) {
            buf.copy_from_slice(&slot.data);
            slot.referenced = true;
            return Ok(());
        }

        // 未命中：淘汰一个槽位，从设备取块
        let index = pool.next_victim();
        log::trace!("cache miss: read {:?}, victim slot {}", block_id, index);
        let slot = &mut pool.slots[index];
        slot.write_back(&self.dev)?;
        slot.frame = None;
        self.dev.read_block(block_id.into(), &mut slot.data)?;
        slot.frame = Some(block_id);
        slot.referenced = true;
        slot.dirty = false;
        buf.copy_from_slice(&slot.data);
        Ok(())
    }

    /// 经缓存写入一个块。只写缓冲并打脏位，不写穿到设备。
    pub fn write(&self, block_id: BlockId, buf: &[u8]) -> Result<()> {
        assert_eq!(buf.len(), BLOCK_SIZE);
        let mut pool = self.pool.lock().unwrap();

        if let Some(slot) = pool.slots.iter_mut().find(|s| s.frame == Some(block_id)) {
            slot.data.copy_from_slice(buf);
            slot.referenced = true;
            slot.dirty = true;
            return Ok(());
        }

        // 未命中：淘汰后直接以调用者数据填充，无需读设备
        let index = pool.next_victim();
        log::trace!("cache miss: write {:?}, victim slot {}", block_id, index);
        let slot = &mut pool.slots[index];
        slot.write_back(&self.dev)?;
        slot.data.copy_from_slice(buf);
        slot.frame = Some(block_id);
        slot.referenced = true;
        slot.dirty = true;
        Ok(())
    }

    /// 写回全部脏块并让设备落盘；块仍驻留在缓存中
    pub fn sync(&self) -> Result<()> {
        let mut pool = self.pool.lock().unwrap();
        for slot in &mut pool.slots {
            slot.write_back(&self.dev)?;
        }
        self.dev.sync()?;
        Ok(())
    }

    /// 写回全部脏块，然后清空整个缓冲池
    pub fn flush(&self) -> Result<()> {
        let mut pool = self.pool.lock().unwrap();
        for slot in &mut pool.slots {
            slot.write_back(&self.dev)?;
            slot.frame = None;
            slot.referenced = false;
        }
        self.dev.sync()?;
        Ok(())
    }
}

impl Pool {
    /// 二次机会淘汰。先找空槽；没有空槽时从时钟指针处环形扫描，
    /// 清掉途经槽位的最近使用位，返回第一个该位已清零的槽。
    /// 一整圈之后所有位都被清零，因此至多两圈必然终止。
    fn next_victim(&mut self) -> usize {
        if let Some(index) = self.slots.iter().position(|s| s.frame.is_none()) {
            return index;
        }

        loop {
            self.victim = (self.victim + 1) % self.slots.len();
            if !self.slots[self.victim].referenced {
                return self.victim;
            }
            self.slots[self.victim].referenced = false;
        }
    }
}

impl Drop for BlockCache {
    fn drop(&mut self) {
        if let Err(e) = self.sync() {
            log::warn!("write-back on drop failed: {:?}", e);
        }
    }
}
