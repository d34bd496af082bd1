//! # 文件系统编排层
//!
//! 持有一卷的全部状态：块缓存、超级块、目录与打开文件表，
//! 对外提供 open/read/write/seek/close/delete/format/sync。
//!
//! 读写沿 inode 的直接/间接映射逐块推进；写到未映射处时向超级块
//! 要空闲块并当场注册。目录的字节形态寄存在 0 号 inode 的文件里，
//! 挂载时读入，`sync` 时写回。

use std::sync::{Arc, Mutex};

use block_dev::BlockDevice;

use crate::file_table::HandleState;
use crate::inode::Register;
use crate::BlockCache;
use crate::BlockId;
use crate::Directory;
use crate::FileHandle;
use crate::FileTable;
use crate::FsError;
use crate::Inode;
use crate::OpenMode;
use crate::Result;
use crate::SuperBlock;
use crate::Whence;
use crate::{BLOCK_SIZE, CACHE_CAPACITY};

pub struct FileSystem {
    cache: BlockCache,
    superblock: Mutex<SuperBlock>,
    dir: Arc<Mutex<Directory>>,
    table: FileTable,
}

impl FileSystem {
    /// 挂载一卷。卷头无效时先按缺省参数格式化；
    /// 然后读入根目录文件，重建目录。
    pub fn new(dev: Arc<dyn BlockDevice>, total_blocks: usize) -> Result<Self> {
        let cache = BlockCache::new(dev, CACHE_CAPACITY);
        let superblock = SuperBlock::load(&cache, total_blocks)?;
        let dir = Arc::new(Mutex::new(Directory::new(superblock.total_inodes())));

        let fs = Self {
            cache,
            superblock: Mutex::new(superblock),
            table: FileTable::new(dir.clone()),
            dir,
        };

        let root = fs.open("/", OpenMode::Read)?;
        let size = fs.fsize(&root);
        if size > 0 {
            let mut data = vec![0u8; size];
            let read = fs.read(&root, &mut data)?;
            let mut dir = fs.dir.lock().unwrap();
            if read == dir.encoded_len() {
                dir.restore(&data);
            } else {
                log::warn!("root file holds {} bytes, expected {}", read, dir.encoded_len());
            }
        }
        fs.close(&root)?;
        Ok(fs)
    }

    /// 打开文件。写模式在授予后立即截断：旧有数据块全部归还超级块。
    pub fn open(&self, name: &str, mode: OpenMode) -> Result<Arc<FileHandle>> {
        let handle = self.table.falloc(&self.cache, name, mode)?;
        if mode == OpenMode::Write {
            self.dealloc_all_blocks(&handle)?;
        }
        Ok(handle)
    }

    /// 从当前寻址指针处读。到达文件末尾或映射尽头即提前返回，
    /// 返回实际读出的字节数。
    pub fn read(&self, handle: &FileHandle, buf: &mut [u8]) -> Result<usize> {
        if handle.mode() != OpenMode::Read {
            return Err(FsError::WrongMode);
        }

        let mut state = handle.state();
        let file_size = state.inode.length as usize;
        let mut index = 0;

        while index < buf.len() && state.seek < file_size {
            let Some(target) = state.inode.target_block(state.seek / BLOCK_SIZE, &self.cache)?
            else {
                // 分配是连续的：中途未映射即意味着可读数据到此为止
                break;
            };

            let mut block = [0u8; BLOCK_SIZE];
            self.cache.read(target, &mut block)?;

            let offset = state.seek % BLOCK_SIZE;
            let n = (BLOCK_SIZE - offset)
                .min(buf.len() - index)
                .min(file_size - state.seek);
            buf[index..index + n].copy_from_slice(&block[offset..offset + n]);

            state.seek += n;
            index += n;
        }
        Ok(index)
    }

    /// 自当前寻址指针写入整个缓冲。指针越过文件长度时即时扩展长度；
    /// 无论中途成败，inode 都会带着已提交的进度写回。
    pub fn write(&self, handle: &FileHandle, buf: &[u8]) -> Result<usize> {
        if handle.mode() == OpenMode::Read {
            return Err(FsError::WrongMode);
        }

        let mut state = handle.state();
        let written = self.write_loop(&mut state, buf);
        let stored = state.inode.store(&self.cache, handle.inum());
        let written = written?;
        stored?;
        Ok(written)
    }

    fn write_loop(&self, state: &mut HandleState, buf: &[u8]) -> Result<usize> {
        let mut index = 0;
        while index < buf.len() {
            let block_index = state.seek / BLOCK_SIZE;
            let target = match state.inode.target_block(block_index, &self.cache)? {
                Some(target) => target,
                None => self.grow(&mut state.inode, block_index)?,
            };

            let mut block = [0u8; BLOCK_SIZE];
            self.cache.read(target, &mut block)?;

            let offset = state.seek % BLOCK_SIZE;
            let n = (BLOCK_SIZE - offset).min(buf.len() - index);
            block[offset..offset + n].copy_from_slice(&buf[index..index + n]);
            self.cache.write(target, &block)?;

            state.seek += n;
            index += n;
            if state.seek > state.inode.length as usize {
                state.inode.length = state.seek as u32;
            }
        }
        Ok(index)
    }

    /// 为文件的第 `block_index` 个逻辑块分配并注册一个空闲块。
    /// 直接表耗尽时先建间接块。注册失败的话把弹出的块压回链表。
    fn grow(&self, inode: &mut Inode, block_index: usize) -> Result<BlockId> {
        let free = self
            .superblock
            .lock()
            .unwrap()
            .get_free_block(&self.cache)?
            .ok_or(FsError::NoFreeBlocks)?;

        let outcome = match inode.register_block(block_index, free, &self.cache) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.superblock
                    .lock()
                    .unwrap()
                    .return_block(free, &self.cache)?;
                return Err(e);
            }
        };
        if outcome == Register::Registered {
            return Ok(free);
        }

        // 先补上间接块，再重试注册
        let index_block = self
            .superblock
            .lock()
            .unwrap()
            .get_free_block(&self.cache)?;
        let Some(index_block) = index_block else {
            self.superblock
                .lock()
                .unwrap()
                .return_block(free, &self.cache)?;
            return Err(FsError::NoFreeBlocks);
        };
        inode.register_index_block(index_block, &self.cache)?;
        match inode.register_block(block_index, free, &self.cache)? {
            Register::Registered => Ok(free),
            Register::MissingIndex => Err(FsError::BrokenBlockMap),
        }
    }

    /// 移动寻址指针，返回新位置。结果夹在 `[0, 文件长度]` 内。
    pub fn seek(&self, handle: &FileHandle, offset: i64, whence: Whence) -> Result<usize> {
        let mut state = handle.state();
        let pos = match whence {
            Whence::Set => offset,
            Whence::Cur => state.seek as i64 + offset,
            Whence::End => state.inode.length as i64 + offset,
        };
        state.seek = pos.clamp(0, state.inode.length as i64) as usize;
        Ok(state.seek)
    }

    /// 关闭句柄。共享计数归零时经由文件表真正释放并唤醒等待者。
    pub fn close(&self, handle: &Arc<FileHandle>) -> Result<bool> {
        {
            let mut state = handle.state();
            state.open_count -= 1;
            if state.open_count > 0 {
                return Ok(true);
            }
        }
        self.table.ffree(&self.cache, handle)
    }

    /// 再取得一份共享句柄
    pub fn dup(&self, handle: &Arc<FileHandle>) -> Arc<FileHandle> {
        handle.state().open_count += 1;
        handle.clone()
    }

    /// 删除文件：以写模式打开（顺带截断），关闭后释放目录槽位
    pub fn delete(&self, name: &str) -> Result<()> {
        let handle = self.open(name, OpenMode::Write)?;
        let inum = handle.inum();
        self.close(&handle)?;
        if self.dir.lock().unwrap().ifree(inum) {
            Ok(())
        } else {
            Err(FsError::NotFound)
        }
    }

    /// 文件长度（字节）
    pub fn fsize(&self, handle: &FileHandle) -> usize {
        handle.state().inode.length as usize
    }

    /// 全部已分配的目录项：(inode 编号, 文件名, 文件长度)
    pub fn list(&self) -> Result<Vec<(usize, String, usize)>> {
        let entries: Vec<(usize, String)> = self
            .dir
            .lock()
            .unwrap()
            .entries()
            .map(|(inum, name)| (inum, name.to_string()))
            .collect();

        entries
            .into_iter()
            .map(|(inum, name)| {
                let inode = Inode::load(&self.cache, inum)?;
                Ok((inum, name, inode.length as usize))
            })
            .collect()
    }

    /// 是否已无任何打开的文件
    pub fn fempty(&self) -> bool {
        self.table.fempty()
    }

    /// 卷级格式化。要求没有任何打开的文件。
    pub fn format(&self, inode_count: usize) -> Result<()> {
        if !self.table.fempty() {
            return Err(FsError::Busy);
        }
        // 旧缓存内容对新卷毫无意义，先整体作废
        self.cache.flush()?;
        self.superblock
            .lock()
            .unwrap()
            .format(inode_count, &self.cache)?;
        *self.dir.lock().unwrap() = Directory::new(inode_count);
        self.table.clear();
        Ok(())
    }

    /// 把目录写进根目录文件，持久化卷头，再让缓存与设备落盘
    pub fn sync(&self) -> Result<()> {
        let root = self.open("/", OpenMode::Write)?;
        let data = self.dir.lock().unwrap().encode();
        self.write(&root, &data)?;
        self.close(&root)?;
        self.superblock.lock().unwrap().sync(&self.cache)?;
        self.cache.sync()
    }

    /// 截断：间接块里登记的数据块、间接块自身、再到全部直接块，
    /// 逐一归还空闲链表，长度清零后写回 inode。
    fn dealloc_all_blocks(&self, handle: &Arc<FileHandle>) -> Result<()> {
        let mut state = handle.state();

        if let Some((index_block, data)) = state.inode.unregister_index_block(&self.cache)? {
            for id in Inode::index_entries(&data) {
                self.superblock.lock().unwrap().return_block(id, &self.cache)?;
            }
            self.superblock
                .lock()
                .unwrap()
                .return_block(index_block, &self.cache)?;
        }

        let direct: Vec<_> = state.inode.take_direct_blocks().collect();
        for id in direct {
            self.superblock.lock().unwrap().return_block(id, &self.cache)?;
        }

        state.inode.length = 0;
        state.seek = 0;
        state.inode.store(&self.cache, handle.inum())
    }
}
