use std::path::PathBuf;

use case_loader::config::JobConfig;
use case_loader::schema::{Dialect, SchemaPlan, UnknownTypePolicy};
use case_loader::{normalize, pipeline, writer};
use criterion::{Criterion, criterion_group, criterion_main};
use tempfile::TempDir;

const CATEGORIES: [&str; 4] = ["产研问题-接口", "学科问题A", "编排", "其他"];
const PERIOD_SUBJECTS: [&str; 3] = ["初中数学", "高中物理", "小学语文"];
const CHART_TABLE: [&str; 3] = ["有图", "有表格", "无"];

fn header() -> Vec<String> {
    let mut header: Vec<String> = ["书本id", "题目id", "题目url", "原题", "截图"]
        .map(String::from)
        .to_vec();
    header.extend(std::iter::repeat_n(String::new(), 5));
    header.extend(
        ["问题分类", "问题描述", "反馈人", "反馈日期", "处理状态", "处理人", "难度", "备注"]
            .map(String::from),
    );
    header.push(String::new());
    header.push("截图".to_string());
    header.extend(["错误类型", "严重程度", "修复版本", "复核人", "复核结果"].map(String::from));
    header.extend(std::iter::repeat_n(String::new(), 10));
    header.push("0".to_string());
    header
}

fn generate_export(rows: usize) -> (TempDir, PathBuf) {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let csv_path = temp_dir.path().join("cases.csv");
    let mut writer = csv::Writer::from_path(&csv_path).expect("create csv");
    writer.write_record(header()).expect("header");
    for i in 0..rows {
        // Every tenth row repeats an earlier id.
        let id = if i % 10 == 9 { i / 2 } else { i };
        let mut record = vec![
            format!("b-{}", i % 40),
            id.to_string(),
            format!("https://items.example/{id}"),
            "原题".to_string(),
            String::new(),
            "七年级".to_string(),
            "选择题".to_string(),
            PERIOD_SUBJECTS[i % PERIOD_SUBJECTS.len()].to_string(),
            CHART_TABLE[i % CHART_TABLE.len()].to_string(),
            "无".to_string(),
            CATEGORIES[i % CATEGORIES.len()].to_string(),
            format!("描述 {i}"),
            "王芳".to_string(),
            format!("2024-03-{:02}", i % 28 + 1),
            "已处理".to_string(),
            "李雷".to_string(),
            (i % 5).to_string(),
            String::new(),
            String::new(),
            String::new(),
            "解析错误".to_string(),
            "中".to_string(),
            "v2".to_string(),
            "韩梅".to_string(),
            "通过".to_string(),
        ];
        record.extend(std::iter::repeat_n(String::new(), 11));
        writer.write_record(&record).expect("row");
    }
    writer.flush().expect("flush csv");
    (temp_dir, csv_path)
}

fn bench_pipeline(c: &mut Criterion) {
    let (_dir, csv_path) = generate_export(10_000);
    let config = JobConfig::default();
    let loaded_at = normalize::batch_timestamp();

    c.bench_function("prepare_10k_rows", |b| {
        b.iter(|| pipeline::prepare(&config, &csv_path, loaded_at).expect("prepare"))
    });

    let dataset = pipeline::prepare(&config, &csv_path, loaded_at).expect("prepare");
    c.bench_function("plan_and_bind_10k_rows", |b| {
        b.iter(|| {
            let plan = SchemaPlan::infer(&dataset, UnknownTypePolicy::Varchar).expect("plan");
            let sql = plan.insert_sql("cases", Dialect::MySql).expect("insert sql");
            (sql, writer::to_sql_rows(&dataset).len())
        })
    });
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
