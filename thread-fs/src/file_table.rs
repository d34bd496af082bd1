//! # 打开文件表
//!
//! 系统里所有处于打开状态的 (inode, 模式) 对都登记在这里。
//! 并发打开按 inode 记录上的 [`AccessFlag`] 仲裁：读者可以共享，
//! 写者独占；暂时不可授予的请求挂起，等某次释放唤醒后重新评估。
//!
//! `falloc`/`ffree` 全系统串行：同一时刻只评估一个打开或关闭的迁移，
//! 但挂起的调用者会让出独占权，不会阻塞别人推进。

use std::sync::{Arc, Condvar, Mutex};

use crate::AccessFlag;
use crate::BlockCache;
use crate::Directory;
use crate::FsError;
use crate::Inode;
use crate::Result;

/// 根目录项固定占用的 inode
pub(crate) const ROOT_INUM: usize = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
    /// 写打开的一种：不截断，起始寻址指针停在文件末尾
    Append,
}

/// seek 的基准
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    /// 绝对偏移
    Set,
    /// 自当前指针
    Cur,
    /// 自文件末尾，偏移通常为负
    End,
}

/// 一次成功的打开对应一个表项。
/// 寻址指针与 inode 快照由表项自己的锁保护：不同表项上的操作可以并行，
/// 同一表项上的操作彼此原子。
pub struct FileHandle {
    inum: usize,
    mode: OpenMode,
    state: Mutex<HandleState>,
}

pub(crate) struct HandleState {
    /// 下一次读写的字节偏移
    pub seek: usize,
    /// inode 的内存快照，写路径结束时整体写回
    pub inode: Inode,
    /// 共享此表项的句柄数，归零才真正释放
    pub open_count: usize,
}

impl FileHandle {
    pub fn inum(&self) -> usize {
        self.inum
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub(crate) fn state(&self) -> std::sync::MutexGuard<'_, HandleState> {
        self.state.lock().unwrap()
    }
}

pub struct FileTable {
    dir: Arc<Mutex<Directory>>,
    table: Mutex<Vec<Arc<FileHandle>>>,
    /// 每次 `ffree` 后全体唤醒，挂起的打开请求重新评估标志
    released: Condvar,
}

impl FileTable {
    pub fn new(dir: Arc<Mutex<Directory>>) -> Self {
        Self {
            dir,
            table: Mutex::new(Vec::new()),
            released: Condvar::new(),
        }
    }

    /// 解析文件名并分配表项。不可立即授予时在此挂起；
    /// 以读模式打开不存在的文件是查找失败。
    pub fn falloc(&self, cache: &BlockCache, name: &str, mode: OpenMode) -> Result<Arc<FileHandle>> {
        let mut table = self.table.lock().unwrap();

        let (inum, mut inode) = loop {
            let inum = if name == "/" {
                Some(ROOT_INUM)
            } else {
                self.dir.lock().unwrap().namei(name)
            };

            let Some(inum) = inum else {
                if mode == OpenMode::Read {
                    return Err(FsError::NotFound);
                }
                // 新文件：目录分配槽位，inode 直接进入写持有态
                let inum = self
                    .dir
                    .lock()
                    .unwrap()
                    .ialloc(name)
                    .ok_or(FsError::DirectoryFull)?;
                let mut inode = Inode::default();
                inode.flag = AccessFlag::Writing;
                break (inum, inode);
            };

            // 每轮重新读取记录：别的调用者可能已经迁移了标志
            let mut inode = Inode::load(cache, inum)?;
            match mode {
                OpenMode::Read => {
                    if matches!(inode.flag, AccessFlag::Unused | AccessFlag::Reading) {
                        inode.flag = AccessFlag::Reading;
                        break (inum, inode);
                    }
                }
                OpenMode::Write | OpenMode::Append => match inode.flag {
                    AccessFlag::Unused | AccessFlag::WriterQueued => {
                        inode.flag = AccessFlag::Writing;
                        break (inum, inode);
                    }
                    AccessFlag::Reading => {
                        inode.flag = AccessFlag::ReadingWriterQueued;
                        inode.store(cache, inum)?;
                    }
                    AccessFlag::Writing => {
                        inode.flag = AccessFlag::WritingWriterQueued;
                        inode.store(cache, inum)?;
                    }
                    // 已有写者排队，接着等
                    _ => {}
                },
            }

            log::debug!("open {:?} on inode {} blocked, flag {:?}", mode, inum, inode.flag);
            table = self.released.wait(table).unwrap();
        };

        inode.count += 1;
        inode.store(cache, inum)?;

        let seek = match mode {
            OpenMode::Append => inode.length as usize,
            _ => 0,
        };
        let handle = Arc::new(FileHandle {
            inum,
            mode,
            state: Mutex::new(HandleState {
                seek,
                inode,
                open_count: 1,
            }),
        });
        table.push(handle.clone());
        Ok(handle)
    }

    /// 注销表项：迁移访问标志、写回 inode、唤醒全部等待者。
    /// 持有中的标志退回未使用；带写者等待的标志降级为「写者可以上了」。
    ///
    /// 标志以磁盘上的记录为准，而非表项的快照：挂起的写者可能已把它
    /// 推进到「有写者等待」。
    pub fn ffree(&self, cache: &BlockCache, handle: &Arc<FileHandle>) -> Result<bool> {
        let mut table = self.table.lock().unwrap();
        let Some(index) = table.iter().position(|e| Arc::ptr_eq(e, handle)) else {
            return Ok(false);
        };
        table.remove(index);

        let mut inode = Inode::load(cache, handle.inum)?;
        inode.count -= 1;
        inode.flag = match inode.flag {
            AccessFlag::Reading | AccessFlag::Writing => AccessFlag::Unused,
            AccessFlag::ReadingWriterQueued | AccessFlag::WritingWriterQueued => {
                AccessFlag::WriterQueued
            }
            flag => flag,
        };
        inode.store(cache, handle.inum)?;

        self.released.notify_all();
        Ok(true)
    }

    /// 表是否已空。卷级格式化前必须确认。
    pub fn fempty(&self) -> bool {
        self.table.lock().unwrap().is_empty()
    }

    pub(crate) fn clear(&self) {
        self.table.lock().unwrap().clear();
    }
}
