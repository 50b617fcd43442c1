//! Detects prose-only answers to requests that needed a capability call.
//!
//! Independent of the task analyzer: the analyzer decides whether to plan,
//! this decides whether a text reply is an acceptable final answer.

const ACTION_KEYWORDS_CJK: &[&str] = &[
    "创建", "新建", "写入", "保存", "删除", "修改", "运行", "执行", "搜索", "查找", "读取", "打开",
    "下载", "安装", "生成", "发送",
];

const ACTION_KEYWORDS_ASCII: &[&str] = &[
    "create", "write", "save", "delete", "remove", "edit", "modify", "run", "execute", "search",
    "find", "read", "open", "download", "install", "generate", "send", "fetch",
];

/// Model replies that ask the user something are never treated as evasion.
fn is_clarifying_question(response: &str) -> bool {
    let trimmed = response.trim_end();
    trimmed.ends_with('?') || trimmed.ends_with('？')
}

#[derive(Debug, Clone, Copy)]
pub struct ActionIntentDetector {
    enforcement_iterations: u32,
}

impl ActionIntentDetector {
    pub fn new(enforcement_iterations: u32) -> Self {
        Self { enforcement_iterations }
    }

    /// Whether the request text asks for something only a capability can do.
    pub fn requires_action(request: &str) -> bool {
        let lower = request.to_lowercase();
        if ACTION_KEYWORDS_CJK.iter().any(|k| lower.contains(k)) {
            return true;
        }
        lower
            .split(|c: char| !c.is_ascii_alphanumeric())
            .any(|word| ACTION_KEYWORDS_ASCII.contains(&word))
    }

    /// True when a text-only response should be rejected with a corrective
    /// prompt. Only applies during the first `enforcement_iterations` turns
    /// and only while no capability has run for this request.
    pub fn missing_capability_call(
        &self,
        request: &str,
        response: &str,
        iteration: u32,
        capabilities_executed: usize,
    ) -> bool {
        iteration <= self.enforcement_iterations
            && capabilities_executed == 0
            && Self::requires_action(request)
            && !is_clarifying_question(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_action() {
        assert!(ActionIntentDetector::requires_action("创建配置文件 config.yaml"));
        assert!(ActionIntentDetector::requires_action("Please run the test suite"));
        assert!(!ActionIntentDetector::requires_action("今天天气怎么样？"));
        assert!(!ActionIntentDetector::requires_action("Tell me about rust traits"));
        // substring of a longer word is not an action
        assert!(!ActionIntentDetector::requires_action("the runner is thread-safe"));
    }

    #[test]
    fn test_missing_call_window() {
        let detector = ActionIntentDetector::new(2);
        let request = "create notes.txt";
        assert!(detector.missing_capability_call(request, "Done, I created it.", 1, 0));
        assert!(detector.missing_capability_call(request, "Done.", 2, 0));
        assert!(!detector.missing_capability_call(request, "Done.", 3, 0));
        assert!(!detector.missing_capability_call(request, "Done.", 1, 1));
    }

    #[test]
    fn test_questions_are_accepted() {
        let detector = ActionIntentDetector::new(2);
        assert!(!detector.missing_capability_call("create a file", "Which directory should I use?", 1, 0));
        assert!(!detector.missing_capability_call("创建文件", "请问文件名是什么？", 1, 0));
    }
}
