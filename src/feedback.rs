//! 用户反馈存储
//!
//! 追加写入的JSON行文件，每条反馈一行，只增不改。
//! 渲染层和管理界面读取该文件做审计与质量回溯。

use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::Utc;

use crate::error::{TranslationError, TranslationResult};
use crate::types::FeedbackRecord;

pub struct FeedbackStore {
    path: PathBuf,
    // 串行化追加写，保证单条记录不被交错
    write_lock: Mutex<()>,
}

impl FeedbackStore {
    pub fn new(path: impl Into<PathBuf>) -> TranslationResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    /// 追加一条反馈
    #[allow(clippy::too_many_arguments)]
    pub fn submit(
        &self,
        request_id: &str,
        original_text: &str,
        translated_text: &str,
        provider_name: &str,
        rating: Option<u8>,
        corrected_text: Option<String>,
        comment: Option<String>,
    ) -> TranslationResult<FeedbackRecord> {
        if let Some(rating) = rating {
            if !(1..=5).contains(&rating) {
                return Err(TranslationError::InvalidInput(format!(
                    "评分必须在1-5之间: {}",
                    rating
                )));
            }
        }

        let record = FeedbackRecord {
            request_id: request_id.to_string(),
            original_text: original_text.to_string(),
            translated_text: translated_text.to_string(),
            provider_name: provider_name.to_string(),
            rating,
            corrected_text,
            comment,
            created_at: Utc::now(),
        };

        let line = serde_json::to_string(&record)?;

        let _guard = self.write_lock.lock().unwrap();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)?;

        tracing::debug!("反馈已记录: request_id={}", request_id);
        Ok(record)
    }

    /// 读取全部反馈记录；坏行跳过并记录警告
    pub fn load_all(&self) -> TranslationResult<Vec<FeedbackRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = std::fs::File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut records = Vec::new();
        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<FeedbackRecord>(&line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!("反馈文件第{}行无法解析，已跳过: {}", number + 1, e);
                }
            }
        }
        Ok(records)
    }

    pub fn len(&self) -> usize {
        self.load_all().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
