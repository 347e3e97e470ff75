use super::value::{lookup, RawValue, RecognitionObject};
use std::collections::VecDeque;

/// 嵌套结果所在的键，按优先级排列
const NESTED_KEYS: [&str; 4] = ["result", "ocr", "data", "results"];

/// 对象转换可能自引用，嵌套转换超过该层数的节点被丢弃
const MAX_CONVERSIONS: usize = 64;

/// 归一化输出的单个候选行
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub text: Option<String>,
    pub score: RawValue,
}

impl Candidate {
    fn new(text: &RawValue, score: RawValue) -> Self {
        Self {
            text: text.as_str().map(str::to_string),
            score,
        }
    }

    fn unscored(text: &RawValue) -> Self {
        Self::new(text, RawValue::Number(0.0))
    }
}

/// 单个节点的形状分类
enum Shape<'v> {
    Null,
    Text(&'v str),
    Mapping(&'v [(String, RawValue)]),
    /// `[box, (text, score)]`
    LegacyPair {
        text: &'v RawValue,
        score: &'v RawValue,
    },
    Sequence(&'v [RawValue]),
    Object(&'v dyn RecognitionObject),
    Unrecognized,
}

fn classify(value: &RawValue) -> Shape<'_> {
    match value {
        RawValue::Null => Shape::Null,
        RawValue::String(s) => Shape::Text(s),
        RawValue::Mapping(entries) => Shape::Mapping(entries),
        RawValue::Sequence(items) => match items.as_slice() {
            [RawValue::Sequence(geometry), RawValue::Sequence(pair)]
                if is_geometry(geometry) && is_text_score(pair) =>
            {
                Shape::LegacyPair {
                    text: &pair[0],
                    score: &pair[1],
                }
            }
            _ => Shape::Sequence(items),
        },
        RawValue::Object(object) => Shape::Object(object.as_ref()),
        RawValue::Bool(_) | RawValue::Number(_) => Shape::Unrecognized,
    }
}

fn is_geometry(items: &[RawValue]) -> bool {
    items
        .iter()
        .all(|item| matches!(item, RawValue::Sequence(_) | RawValue::Number(_)))
}

fn is_text_score(items: &[RawValue]) -> bool {
    items.len() >= 2
        && matches!(items[0], RawValue::String(_))
        && match &items[1] {
            RawValue::Number(_) => true,
            RawValue::String(s) => s.trim().parse::<f64>().is_ok(),
            _ => false,
        }
}

/// 第二个字段为已经过的对象转换次数，普通数据不计数
enum Node<'a> {
    Borrowed(&'a RawValue, usize),
    Owned(RawValue, usize),
}

/// 惰性候选序列
///
/// 显式栈遍历，不递归；每次调用 [`normalize`] 都会从头重新生成。
pub struct Candidates<'a> {
    stack: Vec<Node<'a>>,
    ready: VecDeque<Candidate>,
}

/// 将任意形状的识别结果展开为有序的 (text, score) 候选
pub fn normalize(raw: &RawValue) -> Candidates<'_> {
    Candidates {
        stack: vec![Node::Borrowed(raw, 0)],
        ready: VecDeque::new(),
    }
}

impl<'a> Iterator for Candidates<'a> {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        loop {
            if let Some(candidate) = self.ready.pop_front() {
                return Some(candidate);
            }

            match self.stack.pop()? {
                Node::Borrowed(value, depth) => {
                    self.visit(value, depth, |child, d| Node::Borrowed(child, d))
                }
                Node::Owned(value, depth) => {
                    self.visit(&value, depth, |child: &RawValue, d| {
                        Node::Owned(child.clone(), d)
                    })
                }
            }
        }
    }
}

impl<'a> Candidates<'a> {
    fn visit<'v, F>(&mut self, value: &'v RawValue, depth: usize, lift: F)
    where
        F: Fn(&'v RawValue, usize) -> Node<'a>,
    {
        if depth > MAX_CONVERSIONS {
            tracing::debug!("Object conversions nested deeper than {}, skipping", MAX_CONVERSIONS);
            return;
        }

        match classify(value) {
            Shape::Null | Shape::Unrecognized => {}
            Shape::Text(_) => self.ready.push_back(Candidate::unscored(value)),
            Shape::Mapping(entries) => self.visit_mapping(entries, depth, lift),
            Shape::LegacyPair { text, score } => {
                self.ready.push_back(Candidate::new(text, score.clone()))
            }
            Shape::Sequence(items) => self.descend(items.iter(), depth, lift),
            Shape::Object(object) => self.visit_object(object, depth),
        }
    }

    fn visit_mapping<'v, F>(&mut self, entries: &'v [(String, RawValue)], depth: usize, lift: F)
    where
        F: Fn(&'v RawValue, usize) -> Node<'a>,
    {
        let get = |key: &str| lookup(entries, key);

        // 单行
        if get("text").is_some() || get("rec_text").is_some() {
            let text = get("text")
                .filter(|v| v.is_truthy())
                .or_else(|| get("rec_text"));
            let score = get("confidence")
                .filter(|v| !v.is_null())
                .or_else(|| get("rec_score").filter(|v| !v.is_null()))
                .cloned()
                .unwrap_or(RawValue::Number(0.0));
            self.ready.push_back(Candidate {
                text: text.and_then(RawValue::as_str).map(str::to_string),
                score,
            });
            return;
        }

        // 并行数组
        if let Some(texts) = get("rec_texts").and_then(RawValue::as_sequence) {
            self.push_parallel(texts, get("rec_scores"));
            return;
        }

        // 嵌套容器
        let nested = NESTED_KEYS
            .iter()
            .filter_map(|key| get(key))
            .find(|v| v.is_truthy())
            .or_else(|| get("results").filter(|v| !v.is_null()));
        if let Some(inner) = nested {
            self.stack.push(lift(inner, depth));
            return;
        }

        self.descend(entries.iter().map(|(_, v)| v), depth, lift);
    }

    fn visit_object(&mut self, object: &dyn RecognitionObject, depth: usize) {
        if let Some(texts) = object.attribute("rec_texts") {
            if let Some(items) = texts.as_sequence() {
                let scores = object.attribute("rec_scores");
                self.push_parallel(items, scores.as_ref());
                return;
            }
        }

        if let Some(converted) = object.to_mapping() {
            match converted {
                Ok(mapping) => {
                    self.stack.push(Node::Owned(mapping, depth + 1));
                    return;
                }
                Err(e) => {
                    tracing::debug!("{} could not be converted: {}", object.type_name(), e);
                }
            }
        }

        if let Some(fields) = object.fields() {
            self.stack.push(Node::Owned(RawValue::Mapping(fields), depth + 1));
        }
    }

    fn push_parallel(&mut self, texts: &[RawValue], scores: Option<&RawValue>) {
        match scores.and_then(RawValue::as_sequence) {
            Some(scores) if scores.len() == texts.len() => {
                for (text, score) in texts.iter().zip(scores) {
                    self.ready.push_back(Candidate::new(text, score.clone()));
                }
            }
            _ => {
                for text in texts {
                    self.ready.push_back(Candidate::unscored(text));
                }
            }
        }
    }

    /// 逆序压栈，保证按原顺序产出
    fn descend<'v, I, F>(&mut self, children: I, depth: usize, lift: F)
    where
        I: DoubleEndedIterator<Item = &'v RawValue>,
        F: Fn(&'v RawValue, usize) -> Node<'a>,
    {
        for child in children.rev() {
            self.stack.push(lift(child, depth));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{coerce_score, ConversionError};
    use serde_json::json;

    fn pairs(raw: &RawValue) -> Vec<(Option<String>, f64)> {
        normalize(raw)
            .map(|c| (c.text, coerce_score(&c.score)))
            .collect()
    }

    fn some(text: &str, score: f64) -> (Option<String>, f64) {
        (Some(text.to_string()), score)
    }

    #[derive(Debug)]
    struct Attributes {
        texts: Vec<&'static str>,
        scores: Vec<f64>,
    }

    impl RecognitionObject for Attributes {
        fn type_name(&self) -> &str {
            "Attributes"
        }

        fn attribute(&self, name: &str) -> Option<RawValue> {
            match name {
                "rec_texts" => Some(self.texts.clone().into()),
                "rec_scores" => Some(self.scores.clone().into()),
                _ => None,
            }
        }
    }

    #[derive(Debug)]
    struct BrokenConversion;

    impl RecognitionObject for BrokenConversion {
        fn type_name(&self) -> &str {
            "BrokenConversion"
        }

        fn to_mapping(&self) -> Option<Result<RawValue, ConversionError>> {
            Some(Err(ConversionError("boom".to_string())))
        }

        fn fields(&self) -> Option<Vec<(String, RawValue)>> {
            Some(vec![("text".to_string(), "from fields".into())])
        }
    }

    #[derive(Debug)]
    struct Convertible {
        with_fields: bool,
    }

    impl RecognitionObject for Convertible {
        fn type_name(&self) -> &str {
            "Convertible"
        }

        fn to_mapping(&self) -> Option<Result<RawValue, ConversionError>> {
            Some(Ok(json!({"rec_texts": ["Q"], "rec_scores": [0.4]}).into()))
        }

        fn fields(&self) -> Option<Vec<(String, RawValue)>> {
            self.with_fields
                .then(|| vec![("text".to_string(), "from fields".into())])
        }
    }

    #[derive(Debug)]
    struct Cyclic;

    impl RecognitionObject for Cyclic {
        fn type_name(&self) -> &str {
            "Cyclic"
        }

        fn to_mapping(&self) -> Option<Result<RawValue, ConversionError>> {
            Some(Ok(RawValue::mapping([("inner", RawValue::object(Cyclic))])))
        }
    }

    #[test]
    fn test_null_and_empty_inputs() {
        assert!(pairs(&RawValue::Null).is_empty());
        assert!(pairs(&json!([]).into()).is_empty());
        assert!(pairs(&json!({}).into()).is_empty());
        assert!(pairs(&json!([null, [], {}]).into()).is_empty());
    }

    #[test]
    fn test_plain_string() {
        assert_eq!(pairs(&"hello".into()), vec![some("hello", 0.0)]);
    }

    #[test]
    fn test_single_line_mapping() {
        let raw = json!({"text": "ABC", "confidence": 0.9}).into();
        assert_eq!(pairs(&raw), vec![some("ABC", 0.9)]);
    }

    #[test]
    fn test_single_line_alternate_keys() {
        let raw = json!({"rec_text": "ABC", "rec_score": 0.4}).into();
        assert_eq!(pairs(&raw), vec![some("ABC", 0.4)]);

        let raw = json!({"text": "", "rec_text": "fallback", "confidence": null, "rec_score": 0.3});
        assert_eq!(pairs(&raw.into()), vec![some("fallback", 0.3)]);

        let raw = json!({"text": "no score"}).into();
        assert_eq!(pairs(&raw), vec![some("no score", 0.0)]);
    }

    #[test]
    fn test_single_line_wins_over_parallel_arrays() {
        let raw = json!({"text": "one", "rec_texts": ["a", "b"]}).into();
        assert_eq!(pairs(&raw), vec![some("one", 0.0)]);
    }

    #[test]
    fn test_parallel_arrays() {
        let raw = json!({"rec_texts": ["A", "B"], "rec_scores": [0.5, 0.8]}).into();
        assert_eq!(pairs(&raw), vec![some("A", 0.5), some("B", 0.8)]);
    }

    #[test]
    fn test_parallel_arrays_length_mismatch() {
        let raw = json!({"rec_texts": ["A", "B"], "rec_scores": [0.5]}).into();
        assert_eq!(pairs(&raw), vec![some("A", 0.0), some("B", 0.0)]);

        let raw = json!({"rec_texts": ["A", "B"]}).into();
        assert_eq!(pairs(&raw), vec![some("A", 0.0), some("B", 0.0)]);
    }

    #[test]
    fn test_parallel_arrays_stop_processing() {
        let raw = json!({"rec_texts": [], "result": {"text": "hidden"}}).into();
        assert!(pairs(&raw).is_empty());
    }

    #[test]
    fn test_nested_payload() {
        let raw = json!({"result": {"rec_texts": ["X"], "rec_scores": [0.1]}}).into();
        assert_eq!(pairs(&raw), vec![some("X", 0.1)]);
    }

    #[test]
    fn test_nested_payload_priority_skips_generic_walk() {
        let raw = json!({
            "other": "ignored",
            "data": [{"text": "from data", "confidence": 0.7}],
            "result": null,
        })
        .into();
        assert_eq!(pairs(&raw), vec![some("from data", 0.7)]);
    }

    #[test]
    fn test_nested_payload_empty_results_yields_nothing() {
        let raw = json!({"results": [], "other": "ignored"}).into();
        assert!(pairs(&raw).is_empty());
    }

    #[test]
    fn test_generic_mapping_walk() {
        let raw = json!({"page1": "first", "page2": {"text": "second", "confidence": 0.2}}).into();
        assert_eq!(pairs(&raw), vec![some("first", 0.0), some("second", 0.2)]);
    }

    #[test]
    fn test_sequence_of_lines() {
        let raw = json!([
            {"text": "a", "confidence": 0.1},
            [{"rec_texts": ["b", "c"], "rec_scores": [0.2, 0.3]}],
            "d"
        ])
        .into();
        assert_eq!(
            pairs(&raw),
            vec![some("a", 0.1), some("b", 0.2), some("c", 0.3), some("d", 0.0)]
        );
    }

    #[test]
    fn test_legacy_pair() {
        let raw = json!([[[0, 0], [10, 10]], ["hello", 0.77]]).into();
        assert_eq!(pairs(&raw), vec![some("hello", 0.77)]);
    }

    #[test]
    fn test_legacy_page_of_pairs() {
        let raw = json!([[
            [[[0, 0], [10, 0], [10, 5], [0, 5]], ["first", 0.9]],
            [[[0, 8], [10, 8], [10, 12], [0, 12]], ["second", 0.8]]
        ]])
        .into();
        assert_eq!(pairs(&raw), vec![some("first", 0.9), some("second", 0.8)]);
    }

    #[test]
    fn test_legacy_pair_with_numeric_string_score() {
        let raw = json!([[[0, 0], [10, 10]], ["hello", "0.77"]]).into();
        assert_eq!(pairs(&raw), vec![some("hello", 0.77)]);

        let raw = json!([[[0, 0], [10, 10]], ["hello", "high"]]).into();
        assert_eq!(pairs(&raw), vec![some("hello", 0.0), some("high", 0.0)]);
    }

    #[test]
    fn test_two_text_lists_are_not_legacy() {
        let raw = json!([["A", "B"], ["C", "D"]]).into();
        assert_eq!(
            pairs(&raw),
            vec![some("A", 0.0), some("B", 0.0), some("C", 0.0), some("D", 0.0)]
        );
    }

    #[test]
    fn test_attribute_object() {
        let raw = RawValue::from(vec![RawValue::object(Attributes {
            texts: vec!["x", "y"],
            scores: vec![0.6, 0.7],
        })]);
        assert_eq!(pairs(&raw), vec![some("x", 0.6), some("y", 0.7)]);

        let raw = RawValue::object(Attributes {
            texts: vec!["x", "y"],
            scores: vec![0.6],
        });
        assert_eq!(pairs(&raw), vec![some("x", 0.0), some("y", 0.0)]);
    }

    #[test]
    fn test_converted_mapping_is_walked() {
        let raw = RawValue::object(Convertible { with_fields: false });
        assert_eq!(pairs(&raw), vec![some("Q", 0.4)]);
    }

    #[test]
    fn test_conversion_wins_over_fields() {
        let raw = RawValue::from(vec![RawValue::object(Convertible { with_fields: true })]);
        assert_eq!(pairs(&raw), vec![some("Q", 0.4)]);
    }

    #[test]
    fn test_failed_conversion_falls_through_to_fields() {
        let raw = RawValue::object(BrokenConversion);
        assert_eq!(pairs(&raw), vec![some("from fields", 0.0)]);
    }

    #[test]
    fn test_self_referencing_object_terminates() {
        let raw = RawValue::object(Cyclic);
        assert!(pairs(&raw).is_empty());
    }

    #[test]
    fn test_deeply_nested_plain_data() {
        let mut raw = json!("deep");
        for _ in 0..100 {
            raw = json!([raw]);
        }
        assert_eq!(pairs(&raw.into()), vec![some("deep", 0.0)]);
    }

    #[test]
    fn test_scalars_are_skipped() {
        let raw = json!([1, true, 2.5, "kept"]).into();
        assert_eq!(pairs(&raw), vec![some("kept", 0.0)]);
    }

    #[test]
    fn test_non_string_text_is_absent() {
        let raw = json!({"text": 42, "confidence": 0.9}).into();
        assert_eq!(pairs(&raw), vec![(None, 0.9)]);
    }

    #[test]
    fn test_restartable() {
        let raw: RawValue = json!({
            "results": [
                {"rec_texts": ["A", "B"], "rec_scores": [0.5, 0.8]},
                [[[0, 0], [1, 1]], ["C", 0.3]]
            ]
        })
        .into();
        let first: Vec<_> = normalize(&raw).collect();
        let second: Vec<_> = normalize(&raw).collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }
}
