#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};

/// Header of the quality-review export, anonymous columns included.
pub fn export_header() -> Vec<&'static str> {
    let mut header = vec!["书本id", "题目id", "题目url", "原题", "截图"];
    header.extend(["", "", "", "", ""]);
    header.extend([
        "问题分类",
        "问题描述",
        "反馈人",
        "反馈日期",
        "处理状态",
        "处理人",
        "难度",
        "备注",
    ]);
    header.push("");
    header.push("截图");
    header.extend(["错误类型", "严重程度", "修复版本", "复核人", "复核结果"]);
    header.extend(std::iter::repeat_n("", 10));
    header.push("0");
    header
}

/// One review row. `None` leaves the identifier cell empty.
#[derive(Debug, Clone)]
pub struct CaseRow {
    pub id: Option<String>,
    pub category: String,
    pub period_subject: String,
    pub chart_table: String,
    pub note: String,
}

impl CaseRow {
    pub fn new(id: i64, category: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            category: category.to_string(),
            period_subject: "初中数学".to_string(),
            chart_table: "有图".to_string(),
            note: String::new(),
        }
    }

    pub fn without_id(category: &str) -> Self {
        Self {
            id: None,
            ..Self::new(0, category)
        }
    }

    pub fn period_subject(mut self, value: &str) -> Self {
        self.period_subject = value.to_string();
        self
    }

    pub fn chart_table(mut self, value: &str) -> Self {
        self.chart_table = value.to_string();
        self
    }

    pub fn note(mut self, value: &str) -> Self {
        self.note = value.to_string();
        self
    }

    fn fields(&self) -> Vec<String> {
        let id = self.id.clone().unwrap_or_default();
        let mut fields = vec![
            "b-17".to_string(),
            id.clone(),
            format!("https://items.example/{id}"),
            "原题内容".to_string(),
            "shot.png".to_string(),
            "七年级".to_string(),
            "选择题".to_string(),
            self.period_subject.clone(),
            self.chart_table.clone(),
            "无公式".to_string(),
            self.category.clone(),
            "答案解析有误".to_string(),
            "王芳".to_string(),
            "2024-03-01".to_string(),
            "已处理".to_string(),
            "李雷".to_string(),
            "3".to_string(),
            self.note.clone(),
            String::new(),
            "shot-2.png".to_string(),
            "解析错误".to_string(),
            "高".to_string(),
            "v2".to_string(),
            "韩梅".to_string(),
            "通过".to_string(),
        ];
        fields.extend(std::iter::repeat_n(String::new(), 10));
        fields.push(String::new());
        fields
    }
}

/// Renders rows under the export header as comma separated text.
pub fn export_csv(rows: &[CaseRow]) -> String {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(export_header()).expect("write header");
    for row in rows {
        writer.write_record(row.fields()).expect("write row");
    }
    String::from_utf8(writer.into_inner().expect("flush csv")).expect("utf8 csv")
}

/// Five rows: three distinct ids, one repeat of 101 and one without an id.
pub fn scenario_rows() -> Vec<CaseRow> {
    vec![
        CaseRow::new(101, "产研问题-其他").note("first"),
        CaseRow::new(102, "学科问题A").period_subject("高中物理"),
        CaseRow::new(103, "编排").chart_table("有表格"),
        CaseRow::new(101, "学科").note("second"),
        CaseRow::without_id("其他"),
    ]
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    /// Writes a job config pointing at `input` and a SQLite file in the workspace.
    pub fn sqlite_job(&self, input: &Path, table: &str) -> (PathBuf, PathBuf) {
        let db_path = self.path().join("cases.sqlite");
        let config = format!(
            "input: {}\ntable: {table}\ndatabase:\n  driver: sqlite\n  path: {}\n",
            yaml_path(input),
            yaml_path(&db_path)
        );
        (self.write("job.yaml", &config), db_path)
    }
}

fn yaml_path(path: &Path) -> String {
    format!("'{}'", path.display().to_string().replace('\'', "''"))
}
