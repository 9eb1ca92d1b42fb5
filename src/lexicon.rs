//! 内置中英双语词表
//!
//! 供质量评估器（术语覆盖、专有名词保留）和本地规则翻译器共用。
//! 词表覆盖科技新闻领域的高频术语，按源词长度降序匹配，
//! 避免 "AI" 抢先匹配 "OpenAI" 这类包含关系。

/// 术语映射表：(英文源词, 中文译词)
pub const TERM_TABLE: &[(&str, &str)] = &[
    ("artificial intelligence", "人工智能"),
    ("machine learning", "机器学习"),
    ("deep learning", "深度学习"),
    ("neural network", "神经网络"),
    ("large language model", "大语言模型"),
    ("natural language processing", "自然语言处理"),
    ("computer vision", "计算机视觉"),
    ("reinforcement learning", "强化学习"),
    ("open source", "开源"),
    ("data center", "数据中心"),
    ("cloud computing", "云计算"),
    ("quantum computing", "量子计算"),
    ("autonomous driving", "自动驾驶"),
    ("semiconductor", "半导体"),
    ("breakthrough", "突破"),
    ("algorithm", "算法"),
    ("chatbot", "聊天机器人"),
    ("benchmark", "基准测试"),
    ("startup", "初创公司"),
    ("investment", "投资"),
    ("regulation", "监管"),
    ("privacy", "隐私"),
    ("security", "安全"),
    ("research", "研究"),
    ("releases", "发布"),
    ("release", "发布"),
    ("announces", "宣布"),
    ("announce", "宣布"),
    ("launches", "推出"),
    ("launch", "推出"),
    ("model", "模型"),
    ("chip", "芯片"),
    ("robot", "机器人"),
    ("satellite", "卫星"),
    ("vaccine", "疫苗"),
    ("economy", "经济"),
    ("market", "市场"),
    ("technology", "技术"),
    ("internet", "互联网"),
    ("software", "软件"),
    ("hardware", "硬件"),
    ("new", "新"),
    ("AI", "人工智能"),
    ("GPU", "图形处理器"),
    ("CPU", "中央处理器"),
    ("API", "应用程序接口"),
    ("5G", "5G"),
];

/// 专有名词表：翻译中应原样保留（或保留官方中文名）的实体
pub const PROPER_NOUNS: &[&str] = &[
    "OpenAI", "Google", "Microsoft", "Apple", "Amazon", "Meta", "NVIDIA",
    "Tesla", "SpaceX", "DeepMind", "Anthropic", "IBM", "Intel", "AMD",
    "Samsung", "Huawei", "Tencent", "Alibaba", "Baidu", "ByteDance",
    "TikTok", "GitHub", "Linux", "Android", "iPhone", "Windows",
];

/// 专有名词的官方中文对照；出现任一形式都视为保留成功
pub const PROPER_NOUN_ALIASES: &[(&str, &str)] = &[
    ("Google", "谷歌"),
    ("Microsoft", "微软"),
    ("Apple", "苹果"),
    ("Amazon", "亚马逊"),
    ("NVIDIA", "英伟达"),
    ("Tesla", "特斯拉"),
    ("Samsung", "三星"),
    ("Huawei", "华为"),
    ("Tencent", "腾讯"),
    ("Alibaba", "阿里巴巴"),
    ("Baidu", "百度"),
    ("ByteDance", "字节跳动"),
    ("Intel", "英特尔"),
];

/// 查找源词的译词（不区分大小写）
pub fn lookup(term: &str) -> Option<&'static str> {
    let lowered = term.to_lowercase();
    TERM_TABLE
        .iter()
        .find(|(en, _)| en.to_lowercase() == lowered)
        .map(|(_, zh)| *zh)
}

/// 专有名词在候选译文中是否得到保留（原样或官方中文名）
pub fn proper_noun_preserved(noun: &str, candidate: &str) -> bool {
    if candidate.contains(noun) {
        return true;
    }
    PROPER_NOUN_ALIASES
        .iter()
        .any(|(en, zh)| *en == noun && candidate.contains(zh))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_case_insensitive() {
        assert_eq!(lookup("AI"), Some("人工智能"));
        assert_eq!(lookup("ai"), Some("人工智能"));
        assert_eq!(lookup("Breakthrough"), Some("突破"));
        assert_eq!(lookup("不存在"), None);
    }

    #[test]
    fn test_proper_noun_alias() {
        assert!(proper_noun_preserved("OpenAI", "OpenAI发布新模型"));
        assert!(proper_noun_preserved("Google", "谷歌宣布新产品"));
        assert!(!proper_noun_preserved("Google", "某公司宣布新产品"));
    }
}
