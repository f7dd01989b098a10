#![allow(dead_code)]

use std::{
    fs,
    io::{Cursor, Write},
    path::{Path, PathBuf},
};

use revu::AssignmentContext;
use uuid::Uuid;
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

pub const SOURCE_BASE: &str = "kadai3";
pub const SOURCE_FILE: &str = "kadai3.c";
pub const HISTORY_FILE: &str = "kadai3-test-history.txt";

/// Two submitted students, one not submitted.
pub const ROSTER: &str = "広大ID,フルネーム,ステータス,点数\n\
B001,山田 太郎,提出済み,\n\
B002,佐藤 花子,提出済み (遅延),80\n\
B003,鈴木 一郎,未提出,\n";

pub const COMPLETE_SOURCE: &str = "/*\n\
 * 氏名: 山田 太郎\n\
 * 学生番号: B001\n\
 * 作成日: 2024-04-01\n\
 * 入出力の説明: 整数を二つ読み込み和を出力する\n\
 * 動きの説明: scanf で読み込み printf で出力する\n\
 * 感想: 楽しかった\n\
 */\n\
#include <stdio.h>\n\
int main(void) { return 0; }\n";

pub const NO_REFLECTION_SOURCE: &str = "/*\n\
 * 氏名: 佐藤 花子\n\
 * 学生番号: B002\n\
 * 作成日: 2024-04-01\n\
 * 入出力の説明: なし\n\
 * 動きの説明: なし\n\
 * 感想:\n\
 */\n\
int main(void) { return 0; }\n";

pub fn temp_root(tag: &str) -> PathBuf {
    let root = std::env::temp_dir().join(format!("revu-{tag}-{}", Uuid::new_v4()));
    fs::create_dir_all(&root).expect("create temp root");
    root
}

/// An assignment laid out in a fresh temporary directory.
pub struct Fixture {
    pub root: PathBuf,
    pub ctx:  AssignmentContext,
}

impl Fixture {
    pub fn new(tag: &str) -> Self {
        Self::with_roster(tag, ROSTER.as_bytes())
    }

    pub fn with_roster(tag: &str, roster: &[u8]) -> Self {
        let root = temp_root(tag);
        fs::write(root.join("roster.csv"), roster).expect("write roster");
        fs::create_dir_all(root.join("submissions")).expect("create submission root");
        let ctx =
            AssignmentContext::in_dir(SOURCE_BASE, SOURCE_BASE, &root, "roster.csv", "submissions");
        Self { root, ctx }
    }

    /// Creates `folder` under the submission root holding `files`.
    pub fn submit(&self, folder: &str, files: &[(&str, &str)]) -> PathBuf {
        let dir = self.ctx.submission_root().join(folder);
        fs::create_dir_all(&dir).expect("create student folder");
        for (name, contents) in files {
            fs::write(dir.join(name), contents).expect("write student file");
        }
        dir
    }

    /// Creates a folder with both required files and a complete header.
    pub fn submit_complete(&self, folder: &str) -> PathBuf {
        self.submit(
            folder,
            &[(SOURCE_FILE, COMPLETE_SOURCE), (HISTORY_FILE, "make test: ok\n")],
        )
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

/// Builds an in-memory ZIP; names ending in `/` become directories.
pub fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, contents) in entries {
        if name.ends_with('/') {
            writer.add_directory(*name, options).expect("add directory");
        } else {
            writer.start_file(*name, options).expect("start file");
            writer.write_all(contents.as_bytes()).expect("write entry");
        }
    }
    writer.finish().expect("finish zip").into_inner()
}

pub fn read(path: &Path) -> String {
    fs::read_to_string(path).expect("read file")
}
