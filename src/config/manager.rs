//! 配置管理器
//!
//! 持有引擎全部可变配置：服务表、成本控制、质量参数。
//! 每次变更先更新内存态，再原子化持久化（写临时文件后改名覆盖），
//! 读取方永远不会看到半个文件。持久化失败会返回给调用方，
//! 但内存态仍按尽力而为的原则保持更新。
//!
//! 成本账本由单独一把互斥锁串行化：它驱动全局自动停用决策，
//! 不允许并发记账产生竞态。

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::constants;
use crate::error::{TranslationError, TranslationResult};

// ============================================================================
// 配置文档结构
// ============================================================================

/// 单个翻译服务的配置
///
/// 启动时从默认值或持久化存储创建；通过配置接口修改；
/// 只会被停用，永远不会被删除。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    /// 适配器类型: "deeplx" | "llm" | "mock"
    pub adapter: String,
    #[serde(default)]
    pub api_url: Option<String>,
    /// 大模型适配器使用的模型名
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub api_keys: Vec<String>,
    #[serde(default)]
    pub current_key_index: usize,
    /// 越小越优先；相同时按名字排序保证全序
    pub priority: u32,
    pub enabled: bool,
    /// 每字符成本（货币单位）
    pub cost_per_char: f64,
    pub quality_threshold: f64,
    pub rate_limit_per_minute: u32,
    pub timeout_ms: u64,
    pub retry_count: u32,
    /// 对比模式下的静态先验权重，[0,1]
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    0.5
}

impl ProviderConfig {
    pub fn new(name: &str, adapter: &str, priority: u32) -> Self {
        Self {
            name: name.to_string(),
            adapter: adapter.to_string(),
            api_url: None,
            model: None,
            api_keys: Vec::new(),
            current_key_index: 0,
            priority,
            enabled: true,
            cost_per_char: 0.000_02,
            quality_threshold: constants::DEFAULT_QUALITY_THRESHOLD,
            rate_limit_per_minute: constants::DEFAULT_RATE_LIMIT_PER_MINUTE,
            timeout_ms: constants::DEFAULT_TIMEOUT_MS,
            retry_count: constants::DEFAULT_RETRY_COUNT,
            weight: default_weight(),
        }
    }

    /// 当前生效的密钥；未配置密钥的服务返回空串
    pub fn current_key(&self) -> &str {
        self.api_keys
            .get(self.current_key_index)
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms)
    }

    fn validate(&self) -> TranslationResult<()> {
        if self.name.is_empty() {
            return Err(TranslationError::ConfigError("服务名不能为空".to_string()));
        }
        if self.timeout_ms == 0 {
            return Err(TranslationError::ConfigError(format!(
                "服务 {} 的超时不能为0",
                self.name
            )));
        }
        if self.cost_per_char < 0.0 {
            return Err(TranslationError::ConfigError(format!(
                "服务 {} 的字符成本不能为负",
                self.name
            )));
        }
        if !(0.0..=1.0).contains(&self.quality_threshold) {
            return Err(TranslationError::ConfigError(format!(
                "服务 {} 的质量阈值必须在[0,1]内",
                self.name
            )));
        }
        Ok(())
    }
}

/// 成本控制配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostControlConfig {
    pub daily_budget: f64,
    pub monthly_budget: f64,
    /// 达到预算的该比例时发出告警
    pub alert_threshold: f64,
    /// 任一预算用尽时停用所有服务
    pub auto_disable: bool,
}

impl Default for CostControlConfig {
    fn default() -> Self {
        Self {
            daily_budget: constants::DEFAULT_DAILY_BUDGET,
            monthly_budget: constants::DEFAULT_MONTHLY_BUDGET,
            alert_threshold: constants::DEFAULT_ALERT_THRESHOLD,
            auto_disable: true,
        }
    }
}

/// 质量评估配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityConfig {
    /// 自适应选路认定"足够好"的质量阈值
    pub quality_threshold: f64,
    /// 进入单服务模式所需的最小样本数
    pub min_sample_size: usize,
    /// 进入单服务模式所需的成功率
    pub single_mode_success_rate: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            quality_threshold: constants::DEFAULT_QUALITY_THRESHOLD,
            min_sample_size: 10,
            single_mode_success_rate: 0.95,
        }
    }
}

/// 完整配置文档（持久化的根结构）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    pub services: Vec<ProviderConfig>,
    pub cost_control: CostControlConfig,
    pub quality_config: QualityConfig,
}

impl Default for EngineSettings {
    fn default() -> Self {
        let mut deeplx = ProviderConfig::new("deeplx", "deeplx", 1);
        deeplx.api_url = Some(crate::providers::deeplx::DEFAULT_API_URL.to_string());

        let mut llm = ProviderConfig::new("llm", "llm", 2);
        llm.api_url = Some("https://api.openai.com/v1/chat/completions".to_string());
        llm.model = Some("gpt-4o-mini".to_string());
        llm.cost_per_char = 0.000_05;

        Self {
            services: vec![deeplx, llm],
            cost_control: CostControlConfig::default(),
            quality_config: QualityConfig::default(),
        }
    }
}

impl EngineSettings {
    pub fn validate(&self) -> TranslationResult<()> {
        if self.services.is_empty() {
            return Err(TranslationError::ConfigError(
                "至少需要配置一个翻译服务".to_string(),
            ));
        }
        let mut names = std::collections::HashSet::new();
        for service in &self.services {
            service.validate()?;
            if !names.insert(service.name.clone()) {
                return Err(TranslationError::ConfigError(format!(
                    "服务名重复: {}",
                    service.name
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.cost_control.alert_threshold) {
            return Err(TranslationError::ConfigError(
                "告警阈值必须在[0,1]内".to_string(),
            ));
        }
        if self.cost_control.daily_budget < 0.0 || self.cost_control.monthly_budget < 0.0 {
            return Err(TranslationError::ConfigError("预算不能为负".to_string()));
        }
        Ok(())
    }

    /// 环境变量覆盖
    fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var("NEWS_TRANSLATOR_DAILY_BUDGET") {
            if let Ok(budget) = value.parse::<f64>() {
                self.cost_control.daily_budget = budget;
                tracing::info!("环境变量覆盖日预算: {}", budget);
            }
        }
        if let Ok(value) = std::env::var("NEWS_TRANSLATOR_MONTHLY_BUDGET") {
            if let Ok(budget) = value.parse::<f64>() {
                self.cost_control.monthly_budget = budget;
            }
        }
        if let Ok(value) = std::env::var("NEWS_TRANSLATOR_AUTO_DISABLE") {
            if let Ok(flag) = value.parse::<bool>() {
                self.cost_control.auto_disable = flag;
            }
        }
    }
}

/// 服务配置的部分更新：只有给出的字段会被修改
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ProviderUpdate {
    pub priority: Option<u32>,
    pub enabled: Option<bool>,
    pub cost_per_char: Option<f64>,
    pub quality_threshold: Option<f64>,
    pub rate_limit_per_minute: Option<u32>,
    pub timeout_ms: Option<u64>,
    pub retry_count: Option<u32>,
    pub weight: Option<f64>,
    pub api_url: Option<String>,
    pub model: Option<String>,
}

// ============================================================================
// 成本账本
// ============================================================================

/// 单条记账
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostRecord {
    pub provider: String,
    pub chars: usize,
    pub cost: f64,
    pub recorded_at: chrono::DateTime<Utc>,
}

#[derive(Debug, Default, Clone)]
struct ProviderAggregate {
    daily_cost: f64,
    monthly_cost: f64,
    total_chars: u64,
}

/// 成本账本：聚合值在周期内单调不减，跨过周期边界时重置
#[derive(Debug)]
struct CostLedger {
    records: Vec<CostRecord>,
    day: NaiveDate,
    month: (i32, u32),
    daily_cost: f64,
    monthly_cost: f64,
    per_provider: HashMap<String, ProviderAggregate>,
}

impl CostLedger {
    fn new() -> Self {
        let today = Utc::now().date_naive();
        Self {
            records: Vec::new(),
            day: today,
            month: (today.year(), today.month()),
            daily_cost: 0.0,
            monthly_cost: 0.0,
            per_provider: HashMap::new(),
        }
    }

    /// 周期边界检查：跨天清零日账，跨月清零月账
    fn roll_period(&mut self) {
        let today = Utc::now().date_naive();
        if today != self.day {
            self.day = today;
            self.daily_cost = 0.0;
            for agg in self.per_provider.values_mut() {
                agg.daily_cost = 0.0;
            }
        }
        let month = (today.year(), today.month());
        if month != self.month {
            self.month = month;
            self.monthly_cost = 0.0;
            for agg in self.per_provider.values_mut() {
                agg.monthly_cost = 0.0;
            }
        }
    }

    fn append(&mut self, provider: &str, chars: usize, cost: f64) {
        self.roll_period();
        self.records.push(CostRecord {
            provider: provider.to_string(),
            chars,
            cost,
            recorded_at: Utc::now(),
        });
        self.daily_cost += cost;
        self.monthly_cost += cost;
        let agg = self.per_provider.entry(provider.to_string()).or_default();
        agg.daily_cost += cost;
        agg.monthly_cost += cost;
        agg.total_chars += chars as u64;
    }
}

/// 成本统计快照
#[derive(Debug, Clone, Serialize)]
pub struct CostStatistics {
    pub daily_cost: f64,
    pub monthly_cost: f64,
    pub daily_budget: f64,
    pub monthly_budget: f64,
    /// 日预算使用率；超支时大于1.0
    pub daily_usage_rate: f64,
    pub monthly_usage_rate: f64,
    pub total_records: usize,
    pub per_provider: HashMap<String, ProviderCostSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderCostSnapshot {
    pub daily_cost: f64,
    pub monthly_cost: f64,
    pub total_chars: u64,
}

// ============================================================================
// 管理器
// ============================================================================

type SettingsListener = Box<dyn Fn(&EngineSettings) + Send + Sync>;

/// 配置管理器
pub struct ConfigManager {
    settings: RwLock<EngineSettings>,
    // 账本驱动全局自动停用，必须串行化
    ledger: Mutex<CostLedger>,
    persist_path: Option<PathBuf>,
    listeners: Mutex<Vec<SettingsListener>>,
}

impl ConfigManager {
    /// 按搜索路径加载配置；找不到则用默认配置
    pub fn new() -> TranslationResult<Self> {
        Self::load_dotenv();

        for path in constants::CONFIG_PATHS {
            let expanded = shellexpand::tilde(path);
            let candidate = Path::new(expanded.as_ref());
            if candidate.exists() {
                tracing::info!("加载配置文件: {}", expanded);
                return Self::from_file(candidate);
            }
        }

        tracing::info!("未找到配置文件，使用默认配置");
        Self::with_settings(EngineSettings::default(), None)
    }

    /// 从指定文件加载
    pub fn from_file(path: &Path) -> TranslationResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TranslationError::ConfigError(format!("读取配置文件失败: {}", e)))?;

        let settings: EngineSettings = if path.extension().map(|e| e == "json").unwrap_or(false) {
            serde_json::from_str(&content)
                .map_err(|e| TranslationError::ConfigError(format!("解析JSON配置失败: {}", e)))?
        } else {
            toml::from_str(&content)
                .map_err(|e| TranslationError::ConfigError(format!("解析TOML配置失败: {}", e)))?
        };

        Self::with_settings(settings, Some(path.to_path_buf()))
    }

    /// 用给定配置构造；`persist_path` 为空时变更不落盘
    pub fn with_settings(
        mut settings: EngineSettings,
        persist_path: Option<PathBuf>,
    ) -> TranslationResult<Self> {
        settings.apply_env_overrides();
        settings.validate()?;

        Ok(Self {
            settings: RwLock::new(settings),
            ledger: Mutex::new(CostLedger::new()),
            persist_path,
            listeners: Mutex::new(Vec::new()),
        })
    }

    fn load_dotenv() {
        for env_file in [".env.local", ".env"] {
            if Path::new(env_file).exists() {
                if dotenv::from_filename(env_file).is_ok() {
                    tracing::info!("已加载环境变量文件: {}", env_file);
                    break;
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // 读取
    // ------------------------------------------------------------------

    /// 配置快照
    pub fn snapshot(&self) -> EngineSettings {
        self.settings.read().unwrap().clone()
    }

    pub fn provider(&self, name: &str) -> Option<ProviderConfig> {
        self.settings
            .read()
            .unwrap()
            .services
            .iter()
            .find(|s| s.name == name)
            .cloned()
    }

    /// 启用中的服务，按优先级排序（数字小者优先，同级按名字）
    pub fn enabled_providers(&self) -> Vec<ProviderConfig> {
        let settings = self.settings.read().unwrap();
        let mut services: Vec<ProviderConfig> = settings
            .services
            .iter()
            .filter(|s| s.enabled)
            .cloned()
            .collect();
        services.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.name.cmp(&b.name)));
        services
    }

    pub fn quality_config(&self) -> QualityConfig {
        self.settings.read().unwrap().quality_config.clone()
    }

    // ------------------------------------------------------------------
    // 变更
    // ------------------------------------------------------------------

    /// 部分字段更新：只改动给出的字段
    pub fn update_provider(&self, name: &str, update: ProviderUpdate) -> TranslationResult<()> {
        {
            let mut settings = self.settings.write().unwrap();
            let service = settings
                .services
                .iter_mut()
                .find(|s| s.name == name)
                .ok_or_else(|| {
                    TranslationError::ConfigError(format!("未知的翻译服务: {}", name))
                })?;

            if let Some(priority) = update.priority {
                service.priority = priority;
            }
            if let Some(enabled) = update.enabled {
                service.enabled = enabled;
            }
            if let Some(cost) = update.cost_per_char {
                service.cost_per_char = cost;
            }
            if let Some(threshold) = update.quality_threshold {
                service.quality_threshold = threshold;
            }
            if let Some(rate) = update.rate_limit_per_minute {
                service.rate_limit_per_minute = rate;
            }
            if let Some(timeout) = update.timeout_ms {
                service.timeout_ms = timeout;
            }
            if let Some(retries) = update.retry_count {
                service.retry_count = retries;
            }
            if let Some(weight) = update.weight {
                service.weight = weight;
            }
            if let Some(api_url) = update.api_url {
                service.api_url = Some(api_url);
            }
            if let Some(model) = update.model {
                service.model = Some(model);
            }
            service.validate()?;
        }

        self.notify_listeners();
        self.persist()
    }

    pub fn set_enabled(&self, name: &str, enabled: bool) -> TranslationResult<()> {
        self.update_provider(
            name,
            ProviderUpdate {
                enabled: Some(enabled),
                ..Default::default()
            },
        )
    }

    /// 轮换API密钥，返回新的下标
    pub fn rotate_key(&self, name: &str) -> TranslationResult<usize> {
        let index = {
            let mut settings = self.settings.write().unwrap();
            let service = settings
                .services
                .iter_mut()
                .find(|s| s.name == name)
                .ok_or_else(|| {
                    TranslationError::ConfigError(format!("未知的翻译服务: {}", name))
                })?;

            if service.api_keys.is_empty() {
                return Err(TranslationError::ConfigError(format!(
                    "服务 {} 未配置API密钥",
                    name
                )));
            }
            service.current_key_index = (service.current_key_index + 1) % service.api_keys.len();
            service.current_key_index
        };

        self.persist()?;
        Ok(index)
    }

    pub fn add_key(&self, name: &str, key: &str) -> TranslationResult<()> {
        {
            let mut settings = self.settings.write().unwrap();
            let service = settings
                .services
                .iter_mut()
                .find(|s| s.name == name)
                .ok_or_else(|| {
                    TranslationError::ConfigError(format!("未知的翻译服务: {}", name))
                })?;
            service.api_keys.push(key.to_string());
        }
        self.persist()
    }

    /// 删除密钥；删除后不足2把时拒绝
    pub fn remove_key(&self, name: &str, index: usize) -> TranslationResult<()> {
        {
            let mut settings = self.settings.write().unwrap();
            let service = settings
                .services
                .iter_mut()
                .find(|s| s.name == name)
                .ok_or_else(|| {
                    TranslationError::ConfigError(format!("未知的翻译服务: {}", name))
                })?;

            if service.api_keys.len() <= 2 {
                return Err(TranslationError::ConfigError(format!(
                    "服务 {} 删除该密钥后将不足2把，已拒绝",
                    name
                )));
            }
            if index >= service.api_keys.len() {
                return Err(TranslationError::ConfigError(format!(
                    "密钥下标越界: {}",
                    index
                )));
            }
            service.api_keys.remove(index);
            if service.current_key_index >= service.api_keys.len() {
                service.current_key_index = 0;
            }
        }
        self.persist()
    }

    // ------------------------------------------------------------------
    // 成本账本
    // ------------------------------------------------------------------

    /// 记一笔成本，重算聚合值，必要时告警或触发全局停用
    pub fn record_cost(&self, provider: &str, chars: usize, cost: f64) -> TranslationResult<()> {
        let (daily_rate, monthly_rate, auto_disable) = {
            let mut ledger = self.ledger.lock().unwrap();
            ledger.append(provider, chars, cost);

            let settings = self.settings.read().unwrap();
            let control = &settings.cost_control;
            let daily_rate = if control.daily_budget > 0.0 {
                ledger.daily_cost / control.daily_budget
            } else {
                // 预算为0意味着任何花费都超支
                if ledger.daily_cost > 0.0 {
                    f64::INFINITY
                } else {
                    0.0
                }
            };
            let monthly_rate = if control.monthly_budget > 0.0 {
                ledger.monthly_cost / control.monthly_budget
            } else if ledger.monthly_cost > 0.0 {
                f64::INFINITY
            } else {
                0.0
            };
            (daily_rate, monthly_rate, control.auto_disable)
        };

        let threshold = self.settings.read().unwrap().cost_control.alert_threshold;
        if daily_rate >= threshold || monthly_rate >= threshold {
            tracing::warn!(
                "翻译成本接近预算: 日用量 {:.1}%，月用量 {:.1}%",
                daily_rate * 100.0,
                monthly_rate * 100.0
            );
        }

        if auto_disable && (daily_rate >= 1.0 || monthly_rate >= 1.0) {
            tracing::error!("预算已用尽，停用所有翻译服务");
            self.disable_all()?;
        }

        Ok(())
    }

    /// 全局停用（预算耗尽时的安全停机）
    fn disable_all(&self) -> TranslationResult<()> {
        {
            let mut settings = self.settings.write().unwrap();
            for service in settings.services.iter_mut() {
                service.enabled = false;
            }
        }
        self.notify_listeners();
        self.persist()
    }

    /// 预算准入：服务被停用或预计成本将超出任一预算时返回 false
    pub fn should_use(&self, provider: &str, estimated_chars: usize) -> bool {
        let Some(service) = self.provider(provider) else {
            return false;
        };
        if !service.enabled {
            return false;
        }

        let projected = estimated_chars as f64 * service.cost_per_char;
        let mut ledger = self.ledger.lock().unwrap();
        ledger.roll_period();

        let settings = self.settings.read().unwrap();
        let control = &settings.cost_control;
        if ledger.daily_cost + projected > control.daily_budget {
            return false;
        }
        if ledger.monthly_cost + projected > control.monthly_budget {
            return false;
        }
        true
    }

    /// 成本统计快照
    pub fn cost_statistics(&self) -> CostStatistics {
        let mut ledger = self.ledger.lock().unwrap();
        ledger.roll_period();
        let settings = self.settings.read().unwrap();
        let control = &settings.cost_control;

        let daily_usage_rate = if control.daily_budget > 0.0 {
            ledger.daily_cost / control.daily_budget
        } else if ledger.daily_cost > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };
        let monthly_usage_rate = if control.monthly_budget > 0.0 {
            ledger.monthly_cost / control.monthly_budget
        } else if ledger.monthly_cost > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        CostStatistics {
            daily_cost: ledger.daily_cost,
            monthly_cost: ledger.monthly_cost,
            daily_budget: control.daily_budget,
            monthly_budget: control.monthly_budget,
            daily_usage_rate,
            monthly_usage_rate,
            total_records: ledger.records.len(),
            per_provider: ledger
                .per_provider
                .iter()
                .map(|(name, agg)| {
                    (
                        name.clone(),
                        ProviderCostSnapshot {
                            daily_cost: agg.daily_cost,
                            monthly_cost: agg.monthly_cost,
                            total_chars: agg.total_chars,
                        },
                    )
                })
                .collect(),
        }
    }

    // ------------------------------------------------------------------
    // 持久化与快照
    // ------------------------------------------------------------------

    /// 原子化持久化：序列化、写临时文件、改名覆盖
    fn persist(&self) -> TranslationResult<()> {
        let Some(path) = &self.persist_path else {
            return Ok(());
        };

        let settings = self.settings.read().unwrap().clone();
        let content = toml::to_string_pretty(&settings)
            .map_err(|e| TranslationError::PersistenceError(format!("序列化配置失败: {}", e)))?;

        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)
            .map_err(|e| TranslationError::PersistenceError(format!("创建配置目录失败: {}", e)))?;

        let mut temp = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| TranslationError::PersistenceError(format!("创建临时文件失败: {}", e)))?;
        temp.write_all(content.as_bytes())
            .map_err(|e| TranslationError::PersistenceError(format!("写入配置失败: {}", e)))?;
        temp.persist(path)
            .map_err(|e| TranslationError::PersistenceError(format!("覆盖配置文件失败: {}", e)))?;

        tracing::debug!("配置已持久化: {}", path.display());
        Ok(())
    }

    /// 导出完整状态快照（TOML）
    pub fn export(&self) -> TranslationResult<String> {
        let settings = self.settings.read().unwrap().clone();
        Ok(toml::to_string_pretty(&settings)?)
    }

    /// 从快照恢复完整状态
    pub fn import(&self, content: &str) -> TranslationResult<()> {
        let settings: EngineSettings = toml::from_str(content)?;
        settings.validate()?;
        {
            let mut current = self.settings.write().unwrap();
            *current = settings;
        }
        self.notify_listeners();
        self.persist()
    }

    /// 从磁盘重新加载（热重载回调）
    pub fn reload_from_disk(&self) -> TranslationResult<()> {
        let Some(path) = &self.persist_path else {
            return Ok(());
        };
        let content = std::fs::read_to_string(path)
            .map_err(|e| TranslationError::ConfigError(format!("读取配置文件失败: {}", e)))?;
        let settings: EngineSettings = toml::from_str(&content)?;
        settings.validate()?;
        {
            let mut current = self.settings.write().unwrap();
            *current = settings;
        }
        tracing::info!("配置已热重载: {}", path.display());
        self.notify_listeners();
        Ok(())
    }

    pub fn persist_path(&self) -> Option<&Path> {
        self.persist_path.as_deref()
    }

    // ------------------------------------------------------------------
    // 监听器
    // ------------------------------------------------------------------

    /// 注册配置变更监听器，变更时同步调用
    pub fn add_listener<F>(&self, listener: F)
    where
        F: Fn(&EngineSettings) + Send + Sync + 'static,
    {
        self.listeners.lock().unwrap().push(Box::new(listener));
    }

    fn notify_listeners(&self) {
        let settings = self.settings.read().unwrap().clone();
        let listeners = self.listeners.lock().unwrap();
        for listener in listeners.iter() {
            listener(&settings);
        }
    }

    /// 生成示例配置文件
    pub fn generate_example_config(path: &str) -> TranslationResult<()> {
        let settings = EngineSettings::default();
        let content = toml::to_string_pretty(&settings)?;
        std::fs::write(path, content)
            .map_err(|e| TranslationError::PersistenceError(format!("写入配置文件失败: {}", e)))?;
        Ok(())
    }
}
