//! Fast, deterministic request complexity classification.
//!
//! Scores a request with weighted keyword categories (English and Chinese)
//! plus length and enumeration heuristics. No I/O and no model call: this
//! gates every request and must stay well under a millisecond.

use crate::domain::models::{AnalyzerConfig, Complexity, TaskAnalysis};

struct Category {
    name: &'static str,
    weight: f64,
    keywords: &'static [&'static str],
}

const CATEGORIES: &[Category] = &[
    Category {
        name: "sequence",
        weight: 0.35,
        keywords: &[
            "先", "然后", "接着", "最后", "首先", "其次", "步骤", "first", "then", "after that",
            "afterwards", "finally", "next", "step by step",
        ],
    },
    Category {
        name: "create",
        weight: 0.25,
        keywords: &[
            "创建", "实现", "开发", "构建", "编写", "生成", "搭建", "create", "implement", "build",
            "develop", "write", "generate", "set up", "scaffold",
        ],
    },
    Category {
        name: "analyze",
        weight: 0.2,
        keywords: &[
            "分析", "调研", "研究", "排查", "analyze", "analyse", "analysis", "investigate",
            "research", "debug", "diagnose",
        ],
    },
    Category {
        name: "modify",
        weight: 0.2,
        keywords: &[
            "重构", "修改", "迁移", "优化", "修复", "refactor", "modify", "migrate", "optimize",
            "fix", "rewrite",
        ],
    },
    Category {
        name: "verify",
        weight: 0.15,
        keywords: &[
            "验证", "测试", "检查", "verify", "test", "tests", "validate", "check",
        ],
    },
    Category {
        name: "scope",
        weight: 0.15,
        keywords: &[
            "项目", "系统", "模块", "配置文件", "代码库", "project", "system", "module", "config",
            "repository", "codebase",
        ],
    },
];

/// Conversational markers that pull the score down.
const CONVERSATIONAL: Category = Category {
    name: "conversational",
    weight: -0.2,
    keywords: &[
        "什么", "怎么样", "吗", "你好", "谢谢", "天气", "what is", "how are", "hello", "thanks",
        "weather",
    ],
};

const LONG_REQUEST_CHARS: usize = 200;
const MEDIUM_REQUEST_CHARS: usize = 80;

/// Classifies requests as simple or complex.
#[derive(Debug, Clone)]
pub struct TaskAnalyzer {
    threshold: f64,
}

impl TaskAnalyzer {
    pub fn new(config: &AnalyzerConfig) -> Self {
        Self {
            threshold: config.complexity_threshold,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Classify `text`. Pure and deterministic.
    pub fn analyze(&self, text: &str) -> TaskAnalysis {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return TaskAnalysis::empty();
        }

        let lower = trimmed.to_lowercase();
        let words = ascii_words(&lower);

        let mut score = 0.0;
        let mut matched = Vec::new();

        for category in CATEGORIES.iter().chain(std::iter::once(&CONVERSATIONAL)) {
            let hits: Vec<&str> = category
                .keywords
                .iter()
                .copied()
                .filter(|kw| keyword_matches(&lower, &words, kw))
                .collect();
            if let Some(first) = hits.first() {
                score += category.weight;
                matched.push(format!("{}:{first}", category.name));
            }
        }

        let chars = trimmed.chars().count();
        if chars > LONG_REQUEST_CHARS {
            score += 0.2;
            matched.push(format!("length:{chars}"));
        } else if chars > MEDIUM_REQUEST_CHARS {
            score += 0.1;
            matched.push(format!("length:{chars}"));
        }

        let enumerated = trimmed
            .lines()
            .filter(|line| {
                let line = line.trim_start();
                line.starts_with(|c: char| c.is_ascii_digit())
                    && line.chars().nth(1).is_some_and(|c| matches!(c, '.' | ')' | '、'))
            })
            .count();
        if enumerated >= 2 {
            score += 0.2;
            matched.push(format!("enumeration:{enumerated}"));
        }

        let score = score.clamp(0.0, 1.0);
        let complexity = if score >= self.threshold {
            Complexity::Complex
        } else {
            Complexity::Simple
        };

        TaskAnalysis {
            complexity,
            confidence: self.confidence(score, complexity),
            matched_indicators: matched,
            needs_plan: complexity == Complexity::Complex,
        }
    }

    /// Distance from the threshold mapped into `[0.5, 1.0]`.
    fn confidence(&self, score: f64, complexity: Complexity) -> f64 {
        let margin = match complexity {
            Complexity::Complex if self.threshold < 1.0 => (score - self.threshold) / (1.0 - self.threshold),
            Complexity::Complex => 1.0,
            Complexity::Simple => (self.threshold - score) / self.threshold,
        };
        (0.5 + 0.5 * margin).clamp(0.0, 1.0)
    }
}

impl Default for TaskAnalyzer {
    fn default() -> Self {
        Self::new(&AnalyzerConfig::default())
    }
}

/// ASCII alphanumeric runs of `lower`, the unit ASCII keywords match against.
pub(crate) fn ascii_words(lower: &str) -> Vec<&str> {
    lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect()
}

/// ASCII keywords match whole words (or the whole phrase); CJK keywords
/// match as substrings since Chinese text has no word boundaries.
pub(crate) fn keyword_matches(lower: &str, words: &[&str], keyword: &str) -> bool {
    if !keyword.is_ascii() {
        return lower.contains(keyword);
    }
    if keyword.contains(' ') {
        let phrase: Vec<&str> = keyword.split(' ').collect();
        return words.windows(phrase.len()).any(|w| w == phrase.as_slice());
    }
    words.contains(&keyword)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_request_is_simple_with_zero_confidence() {
        let analyzer = TaskAnalyzer::default();
        for text in ["", "   ", "\n\t"] {
            let analysis = analyzer.analyze(text);
            assert_eq!(analysis.complexity, Complexity::Simple);
            assert!(analysis.confidence.abs() < f64::EPSILON);
            assert!(!analysis.needs_plan);
            assert!(analysis.matched_indicators.is_empty());
        }
    }

    #[test]
    fn test_weather_question_is_simple() {
        let analysis = TaskAnalyzer::default().analyze("今天天气怎么样？");
        assert_eq!(analysis.complexity, Complexity::Simple);
        assert!(!analysis.needs_plan);
        assert!(analysis.confidence > 0.5);
    }

    #[test]
    fn test_multi_step_chinese_request_is_complex() {
        let analysis = TaskAnalyzer::default().analyze("先分析项目结构，然后创建配置文件，最后验证");
        assert_eq!(analysis.complexity, Complexity::Complex);
        assert!(analysis.needs_plan);
        assert!(analysis.matched_indicators.iter().any(|m| m.starts_with("sequence:")));
        assert!(analysis.matched_indicators.iter().any(|m| m.starts_with("create:")));
    }

    #[test]
    fn test_english_multi_step_request_is_complex() {
        let analysis = TaskAnalyzer::default()
            .analyze("Implement the parser module, then write tests and verify the build");
        assert!(analysis.is_complex());
    }

    #[test]
    fn test_single_action_is_simple() {
        let analysis = TaskAnalyzer::default().analyze("create a file called notes.txt");
        assert_eq!(analysis.complexity, Complexity::Simple);
    }

    #[test]
    fn test_ascii_keywords_match_whole_words() {
        // "latest" must not match "test", "thence" must not match "then".
        let analysis = TaskAnalyzer::default().analyze("show the latest news thence");
        assert!(analysis.matched_indicators.iter().all(|m| !m.starts_with("verify:")));
        assert!(analysis.matched_indicators.iter().all(|m| !m.starts_with("sequence:")));
    }

    #[test]
    fn test_enumerated_request_scores_higher() {
        let analyzer = TaskAnalyzer::default();
        let plain = analyzer.analyze("fix the login bug");
        let listed = analyzer.analyze(
            "fix the login bug\n1. reproduce it\n2. patch it\n3. add a test\n4. watch the system logs",
        );
        assert!(listed.is_complex());
        assert!(!plain.is_complex());
    }

    #[test]
    fn test_deterministic() {
        let analyzer = TaskAnalyzer::default();
        let text = "Refactor the config module and then migrate the tests";
        assert_eq!(analyzer.analyze(text), analyzer.analyze(text));
    }

    #[test]
    fn test_confidence_in_range() {
        let analyzer = TaskAnalyzer::default();
        for text in ["hi", "先分析项目结构，然后创建配置文件，最后验证", "fix it then test it"] {
            let c = analyzer.analyze(text).confidence;
            assert!((0.0..=1.0).contains(&c), "confidence {c} out of range");
        }
    }
}
