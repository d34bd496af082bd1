use std::sync::Arc;

use block_dev::MemDisk;
use thread_fs::{FileSystem, FsError, OpenMode, Whence, BLOCK_SIZE, DIRECT_COUNT};

const TOTAL_BLOCKS: usize = 256;

fn mount(disk: &Arc<MemDisk>) -> FileSystem {
    FileSystem::new(disk.clone(), TOTAL_BLOCKS).unwrap()
}

fn fresh() -> FileSystem {
    mount(&Arc::new(MemDisk::new(TOTAL_BLOCKS, BLOCK_SIZE)))
}

fn put(fs: &FileSystem, name: &str, data: &[u8]) {
    let handle = fs.open(name, OpenMode::Write).unwrap();
    assert_eq!(data.len(), fs.write(&handle, data).unwrap());
    fs.close(&handle).unwrap();
}

fn get(fs: &FileSystem, name: &str) -> Vec<u8> {
    let handle = fs.open(name, OpenMode::Read).unwrap();
    let mut data = vec![0u8; fs.fsize(&handle)];
    assert_eq!(data.len(), fs.read(&handle, &mut data).unwrap());
    fs.close(&handle).unwrap();
    data
}

/// 能覆盖到块边界错位的伪随机内容
fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

#[test]
fn round_trips() {
    let fs = fresh();

    // 零字节、单块内、跨越直接/间接边界的多块
    for (name, len) in [
        ("empty", 0),
        ("tiny", 37),
        ("one-block", BLOCK_SIZE),
        ("indirect", (DIRECT_COUNT + 3) * BLOCK_SIZE + 129),
    ] {
        let data = pattern(len);
        put(&fs, name, &data);
        assert_eq!(data, get(&fs, name), "{name}");
    }
}

#[test]
fn read_stops_at_end_of_file() {
    let fs = fresh();
    put(&fs, "short", b"hello");

    let handle = fs.open("short", OpenMode::Read).unwrap();
    let mut buf = [0u8; 64];
    assert_eq!(5, fs.read(&handle, &mut buf).unwrap());
    assert_eq!(b"hello", &buf[..5]);
    // 指针已到末尾，再读没有东西
    assert_eq!(0, fs.read(&handle, &mut buf).unwrap());
    fs.close(&handle).unwrap();
}

#[test]
fn seek_clamps_into_the_file() {
    let fs = fresh();
    put(&fs, "ten", &pattern(10));

    let handle = fs.open("ten", OpenMode::Read).unwrap();
    assert_eq!(0, fs.seek(&handle, -5, Whence::Set).unwrap());
    assert_eq!(10, fs.seek(&handle, 110, Whence::Set).unwrap());
    assert_eq!(0, fs.seek(&handle, -100, Whence::End).unwrap());
    assert_eq!(10, fs.seek(&handle, 0, Whence::End).unwrap());
    assert_eq!(4, fs.seek(&handle, 4, Whence::Set).unwrap());
    assert_eq!(7, fs.seek(&handle, 3, Whence::Cur).unwrap());
    fs.close(&handle).unwrap();
}

#[test]
fn seek_then_read_from_the_middle() {
    let fs = fresh();
    let data = pattern(3 * BLOCK_SIZE);
    put(&fs, "mid", &data);

    let handle = fs.open("mid", OpenMode::Read).unwrap();
    let offset = BLOCK_SIZE + 200;
    fs.seek(&handle, offset as i64, Whence::Set).unwrap();
    let mut buf = vec![0u8; 700];
    assert_eq!(700, fs.read(&handle, &mut buf).unwrap());
    assert_eq!(&data[offset..offset + 700], &buf[..]);
    fs.close(&handle).unwrap();
}

#[test]
fn write_mode_truncates_on_open() {
    let fs = fresh();
    put(&fs, "victim", &pattern(2 * BLOCK_SIZE));

    // 只打开再关闭，不写一个字节
    let handle = fs.open("victim", OpenMode::Write).unwrap();
    fs.close(&handle).unwrap();

    let handle = fs.open("victim", OpenMode::Read).unwrap();
    assert_eq!(0, fs.fsize(&handle));
    fs.close(&handle).unwrap();
}

#[test]
fn append_continues_at_the_end() {
    let fs = fresh();
    put(&fs, "log", b"abc");

    let handle = fs.open("log", OpenMode::Append).unwrap();
    assert_eq!(3, fs.write(&handle, b"def").unwrap());
    fs.close(&handle).unwrap();

    assert_eq!(b"abcdef", &get(&fs, "log")[..]);
}

#[test]
fn wrong_mode_is_rejected() {
    let fs = fresh();
    put(&fs, "file", b"data");

    let reader = fs.open("file", OpenMode::Read).unwrap();
    assert_eq!(Err(FsError::WrongMode), fs.write(&reader, b"x"));
    fs.close(&reader).unwrap();

    let writer = fs.open("file", OpenMode::Append).unwrap();
    let mut buf = [0u8; 4];
    assert_eq!(Err(FsError::WrongMode), fs.read(&writer, &mut buf));
    fs.close(&writer).unwrap();
}

#[test]
fn missing_file_is_not_found_for_read() {
    let fs = fresh();
    assert!(matches!(
        fs.open("nowhere", OpenMode::Read),
        Err(FsError::NotFound)
    ));
}

#[test]
fn delete_removes_the_name() {
    let fs = fresh();
    put(&fs, "doomed", &pattern(BLOCK_SIZE + 7));

    fs.delete("doomed").unwrap();
    assert!(matches!(
        fs.open("doomed", OpenMode::Read),
        Err(FsError::NotFound)
    ));

    // 腾出的块可以再用
    put(&fs, "successor", &pattern(2 * BLOCK_SIZE));
    assert_eq!(pattern(2 * BLOCK_SIZE), get(&fs, "successor"));
}

#[test]
fn directory_survives_sync_and_remount() {
    let disk = Arc::new(MemDisk::new(TOTAL_BLOCKS, BLOCK_SIZE));
    let alpha = pattern(BLOCK_SIZE + 100);

    {
        let fs = mount(&disk);
        put(&fs, "alpha", &alpha);
        put(&fs, "beta", b"beta-data");
        fs.sync().unwrap();
    }

    let fs = mount(&disk);
    let names: Vec<String> = fs.list().unwrap().into_iter().map(|(_, n, _)| n).collect();
    assert!(names.contains(&"alpha".to_string()));
    assert!(names.contains(&"beta".to_string()));
    assert_eq!(alpha, get(&fs, "alpha"));
    assert_eq!(b"beta-data", &get(&fs, "beta")[..]);
}

#[test]
fn format_wipes_the_volume() {
    let fs = fresh();
    put(&fs, "old", b"old");

    let held = fs.open("old", OpenMode::Read).unwrap();
    assert_eq!(Err(FsError::Busy), fs.format(32));
    fs.close(&held).unwrap();

    fs.format(32).unwrap();
    // 只剩根目录项
    assert_eq!(1, fs.list().unwrap().len());
    assert!(matches!(fs.open("old", OpenMode::Read), Err(FsError::NotFound)));

    put(&fs, "new", b"new");
    assert_eq!(b"new", &get(&fs, "new")[..]);
}

#[test]
fn volume_runs_out_of_blocks() {
    let disk = Arc::new(MemDisk::new(16, BLOCK_SIZE));
    let fs = FileSystem::new(disk, 16).unwrap();

    // 缺省格式化带 64 个 inode，数据区早于块 16 耗尽
    let handle = fs.open("big", OpenMode::Write).unwrap();
    let result = fs.write(&handle, &pattern(32 * BLOCK_SIZE));
    assert_eq!(Err(FsError::NoFreeBlocks), result);
    fs.close(&handle).unwrap();
}

#[test]
fn shared_handles_close_once() {
    let fs = fresh();
    put(&fs, "shared", b"payload");

    let handle = fs.open("shared", OpenMode::Read).unwrap();
    let twin = fs.dup(&handle);
    assert!(fs.close(&twin).unwrap());

    // 第一次 close 只降计数，句柄仍可读
    let mut buf = [0u8; 7];
    assert_eq!(7, fs.read(&handle, &mut buf).unwrap());
    fs.close(&handle).unwrap();
    assert!(fs.fempty());
}
