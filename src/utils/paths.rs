use std::path::{Path, PathBuf};

pub fn runs_dir<P: AsRef<Path>>(data_dir: P) -> PathBuf {
    data_dir.as_ref().join("runs")
}

pub fn run_file_path<P: AsRef<Path>>(runs_dir: P, run_no: u32) -> PathBuf {
    runs_dir.as_ref().join(format!("run_{}.txt", run_no))
}

pub fn merged_index_path<P: AsRef<Path>>(data_dir: P) -> PathBuf {
    data_dir.as_ref().join("merged_index.txt")
}

pub fn final_index_path<P: AsRef<Path>>(data_dir: P) -> PathBuf {
    data_dir.as_ref().join("inverted_index.idx")
}

pub fn lexicon_path<P: AsRef<Path>>(data_dir: P) -> PathBuf {
    data_dir.as_ref().join("lexicon.lex")
}

pub fn page_table_path<P: AsRef<Path>>(data_dir: P) -> PathBuf {
    data_dir.as_ref().join("page_table.pt")
}
