use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use block_dev::{BlockDevice, DeviceError, MemDisk};
use thread_fs::{BlockCache, BlockId, BLOCK_SIZE};

/// 记录设备被触碰次数的内存盘
struct CountingDisk {
    inner: MemDisk,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl CountingDisk {
    fn new(total_blocks: usize) -> Self {
        Self {
            inner: MemDisk::new(total_blocks, BLOCK_SIZE),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// 直接核对设备内容，不计数
    fn raw(&self, block_id: usize) -> [u8; BLOCK_SIZE] {
        let mut buf = [0u8; BLOCK_SIZE];
        self.inner.read_block(block_id, &mut buf).unwrap();
        buf
    }
}

impl BlockDevice for CountingDisk {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), DeviceError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read_block(block_id, buf)
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), DeviceError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.write_block(block_id, buf)
    }

    fn sync(&self) -> Result<(), DeviceError> {
        self.inner.sync()
    }
}

fn filled(byte: u8) -> [u8; BLOCK_SIZE] {
    [byte; BLOCK_SIZE]
}

#[test]
fn resident_blocks_never_touch_the_device() {
    let disk = Arc::new(CountingDisk::new(32));
    let cache = BlockCache::new(disk.clone(), 8);

    // 写未命中直接占用空槽，不读设备
    for id in 0..6usize {
        cache.write(BlockId::from(id), &filled(id as u8)).unwrap();
    }
    assert_eq!(0, disk.reads());
    assert_eq!(0, disk.writes());

    // 容量之内反复读，每次都命中
    let mut buf = [0u8; BLOCK_SIZE];
    for round in 0..3 {
        for id in 0..6usize {
            cache.read(BlockId::from(id), &mut buf).unwrap();
            assert_eq!(filled(id as u8), buf, "round {round}");
        }
    }
    assert_eq!(0, disk.reads());
    assert_eq!(0, disk.writes());
}

#[test]
fn flush_writes_everything_back() {
    let disk = Arc::new(CountingDisk::new(32));
    let cache = BlockCache::new(disk.clone(), 8);

    for id in 0..5usize {
        cache.write(BlockId::from(id), &filled(0xA0 + id as u8)).unwrap();
    }
    cache.flush().unwrap();
    assert_eq!(5, disk.writes());

    // 设备上的每个块都等于最后写入的值
    for id in 0..5usize {
        assert_eq!(filled(0xA0 + id as u8), disk.raw(id));
    }

    // flush 之后缓存已清空，再读要回到设备
    let mut buf = [0u8; BLOCK_SIZE];
    cache.read(BlockId::from(0), &mut buf).unwrap();
    assert_eq!(1, disk.reads());
}

#[test]
fn sync_keeps_blocks_resident() {
    let disk = Arc::new(CountingDisk::new(32));
    let cache = BlockCache::new(disk.clone(), 8);

    cache.write(BlockId::from(3), &filled(0x33)).unwrap();
    cache.sync().unwrap();
    assert_eq!(1, disk.writes());

    let mut buf = [0u8; BLOCK_SIZE];
    cache.read(BlockId::from(3), &mut buf).unwrap();
    assert_eq!(filled(0x33), buf);
    assert_eq!(0, disk.reads());

    // 再次 sync 不重复写干净块
    cache.sync().unwrap();
    assert_eq!(1, disk.writes());
}

#[test]
fn second_chance_evicts_deterministically() {
    let disk = Arc::new(CountingDisk::new(32));
    let cache = BlockCache::new(disk.clone(), 4);

    // 填满四个槽位，全部带最近使用位
    for id in 10..14usize {
        cache.write(BlockId::from(id), &filled(id as u8)).unwrap();
    }
    assert_eq!(0, disk.writes());

    // 第五个块：时钟从头扫一整圈清位后，淘汰 1 号槽位（块 11），
    // 脏块先写回设备
    cache.write(BlockId::from(14), &filled(14)).unwrap();
    assert_eq!(1, disk.writes());
    assert_eq!(filled(11), disk.raw(11));

    // 块 10 仍驻留；块 11 则需要重新去设备取
    let mut buf = [0u8; BLOCK_SIZE];
    cache.read(BlockId::from(10), &mut buf).unwrap();
    assert_eq!(0, disk.reads());
    cache.read(BlockId::from(11), &mut buf).unwrap();
    assert_eq!(1, disk.reads());
    assert_eq!(filled(11), buf);
}
