use crate::utils::error::AppError;
use crate::Result;
use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Multipart, Request},
};
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// multipart上传：`file` 字段为文件，其余字段按文本保存
#[derive(Debug)]
pub struct MediaUpload {
    pub data: Bytes,
    pub file_name: Option<String>,
    pub fields: HashMap<String, String>,
}

#[async_trait]
impl<S> FromRequest<S> for MediaUpload
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self> {
        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| AppError::InvalidInput(format!("Expected multipart form data: {}", e)))?;

        let mut file = None;
        let mut fields = HashMap::new();

        while let Some(field) = multipart.next_field().await.map_err(|e| {
            AppError::InvalidInput(format!("Failed to read multipart field: {}", e))
        })? {
            let name = field.name().unwrap_or_default().to_string();

            if name == "file" {
                let file_name = field.file_name().map(str::to_string);
                let data = field.bytes().await.map_err(|e| {
                    AppError::InvalidInput(format!("Failed to read file data: {}", e))
                })?;
                tracing::debug!("Received file {:?}: {} bytes", file_name, data.len());
                file = Some((data, file_name));
            } else {
                let value = field.text().await.map_err(|e| {
                    AppError::InvalidInput(format!("Failed to read field '{}': {}", name, e))
                })?;
                fields.insert(name, value);
            }
        }

        let (data, file_name) =
            file.ok_or_else(|| AppError::InvalidInput("Missing 'file' field".to_string()))?;

        Ok(Self {
            data,
            file_name,
            fields,
        })
    }
}

impl MediaUpload {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// 上传文件的扩展名（含点），没有时使用 `default_suffix`
    pub fn suffix(&self, default_suffix: &str) -> String {
        self.file_name
            .as_deref()
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty())
            .map(|ext| format!(".{}", ext))
            .unwrap_or_else(|| default_suffix.to_string())
    }

    /// 写入临时文件，文件随返回值drop而删除
    pub fn persist(&self, default_suffix: &str) -> Result<NamedTempFile> {
        let mut tmp = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(&self.suffix(default_suffix))
            .tempfile()?;
        tmp.write_all(&self.data)?;
        tmp.flush()?;
        Ok(tmp)
    }
}
