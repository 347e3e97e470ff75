use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// OCR引擎返回的原始结果（形状未知）
#[derive(Debug, Clone, Default)]
pub enum RawValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Sequence(Vec<RawValue>),
    /// 保持插入顺序的键值对
    Mapping(Vec<(String, RawValue)>),
    /// 引擎自定义的结果对象
    Object(Arc<dyn RecognitionObject>),
}

/// 对象转换为映射失败
#[derive(Error, Debug, Clone)]
#[error("mapping conversion failed: {0}")]
pub struct ConversionError(pub String);

/// 非纯数据结果对象的适配接口
///
/// 每个方法对应一种访问方式，未实现的方法表示对象不提供该视图。
pub trait RecognitionObject: fmt::Debug + Send + Sync {
    fn type_name(&self) -> &str;

    /// 按名称读取属性（如 `rec_texts` / `rec_scores`）
    fn attribute(&self, _name: &str) -> Option<RawValue> {
        None
    }

    /// 可公开的属性名，仅用于调试摘要
    fn attribute_names(&self) -> Vec<String> {
        Vec::new()
    }

    /// 显式的映射转换，可能失败
    fn to_mapping(&self) -> Option<Result<RawValue, ConversionError>> {
        None
    }

    /// 通用字段视图
    fn fields(&self) -> Option<Vec<(String, RawValue)>> {
        None
    }
}

/// 为任意可序列化类型提供字段视图
#[derive(Debug)]
pub struct SerializedObject<T> {
    name: &'static str,
    inner: T,
}

impl<T> SerializedObject<T> {
    pub fn new(name: &'static str, inner: T) -> Self {
        Self { name, inner }
    }
}

impl<T> RecognitionObject for SerializedObject<T>
where
    T: Serialize + fmt::Debug + Send + Sync,
{
    fn type_name(&self) -> &str {
        self.name
    }

    fn attribute_names(&self) -> Vec<String> {
        self.fields()
            .map(|fields| fields.into_iter().map(|(key, _)| key).collect())
            .unwrap_or_default()
    }

    fn fields(&self) -> Option<Vec<(String, RawValue)>> {
        match serde_json::to_value(&self.inner) {
            Ok(serde_json::Value::Object(map)) => {
                Some(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
            Ok(_) => None,
            Err(e) => {
                tracing::debug!("Failed to serialize {}: {}", self.name, e);
                None
            }
        }
    }
}

impl RawValue {
    pub fn object<O: RecognitionObject + 'static>(object: O) -> Self {
        RawValue::Object(Arc::new(object))
    }

    pub fn mapping<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, RawValue)>,
        K: Into<String>,
    {
        RawValue::Mapping(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RawValue::Null)
    }

    /// 映射中第一个匹配的键
    pub fn get(&self, key: &str) -> Option<&RawValue> {
        match self {
            RawValue::Mapping(entries) => lookup(entries, key),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            RawValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[RawValue]> {
        match self {
            RawValue::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// 空值、零、空字符串与空容器视为"空"
    pub fn is_truthy(&self) -> bool {
        match self {
            RawValue::Null => false,
            RawValue::Bool(b) => *b,
            RawValue::Number(n) => *n != 0.0,
            RawValue::String(s) => !s.is_empty(),
            RawValue::Sequence(items) => !items.is_empty(),
            RawValue::Mapping(entries) => !entries.is_empty(),
            RawValue::Object(_) => true,
        }
    }

    pub fn type_name(&self) -> &str {
        match self {
            RawValue::Null => "null",
            RawValue::Bool(_) => "bool",
            RawValue::Number(_) => "number",
            RawValue::String(_) => "string",
            RawValue::Sequence(_) => "list",
            RawValue::Mapping(_) => "dict",
            RawValue::Object(object) => object.type_name(),
        }
    }

    /// 转换为JSON，对象以其字段或类型名表示
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            RawValue::Null => Value::Null,
            RawValue::Bool(b) => Value::Bool(*b),
            RawValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            RawValue::String(s) => Value::String(s.clone()),
            RawValue::Sequence(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            RawValue::Mapping(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            RawValue::Object(object) => match object.fields() {
                Some(fields) => Value::Object(
                    fields
                        .into_iter()
                        .map(|(k, v)| (k, v.to_json()))
                        .collect(),
                ),
                None => Value::String(format!("<{}>", object.type_name())),
            },
        }
    }
}

pub(crate) fn lookup<'a>(entries: &'a [(String, RawValue)], key: &str) -> Option<&'a RawValue> {
    entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl PartialEq for RawValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RawValue::Null, RawValue::Null) => true,
            (RawValue::Bool(a), RawValue::Bool(b)) => a == b,
            (RawValue::Number(a), RawValue::Number(b)) => a == b,
            (RawValue::String(a), RawValue::String(b)) => a == b,
            (RawValue::Sequence(a), RawValue::Sequence(b)) => a == b,
            (RawValue::Mapping(a), RawValue::Mapping(b)) => a == b,
            (RawValue::Object(a), RawValue::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<serde_json::Value> for RawValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => RawValue::Null,
            Value::Bool(b) => RawValue::Bool(b),
            Value::Number(n) => n.as_f64().map(RawValue::Number).unwrap_or(RawValue::Null),
            Value::String(s) => RawValue::String(s),
            Value::Array(items) => RawValue::Sequence(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => {
                RawValue::Mapping(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::String(value)
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::String(value.to_string())
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

impl From<f32> for RawValue {
    fn from(value: f32) -> Self {
        RawValue::Number(value as f64)
    }
}

impl From<bool> for RawValue {
    fn from(value: bool) -> Self {
        RawValue::Bool(value)
    }
}

impl<T: Into<RawValue>> From<Vec<T>> for RawValue {
    fn from(items: Vec<T>) -> Self {
        RawValue::Sequence(items.into_iter().map(Into::into).collect())
    }
}
