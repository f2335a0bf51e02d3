use crate::error::{AppError, Result};

/// 记录ID最大长度
const MAX_ID_LENGTH: usize = 128;

/// 校验评论/回复正文，返回去除首尾空白后的文本
pub fn validate_comment_text(text: &str, max_length: usize) -> Result<String> {
    let trimmed = text.trim();

    if trimmed.is_empty() {
        return Err(AppError::Validation("Comment text is required".to_string()));
    }

    // 按字符计数，避免多字节文本被误判
    if trimmed.chars().count() > max_length {
        return Err(AppError::Validation(format!(
            "Comment cannot exceed {} characters",
            max_length
        )));
    }

    Ok(trimmed.to_string())
}

/// 校验路径中的记录ID格式
pub fn validate_record_id(kind: &str, id: &str) -> Result<()> {
    if id.is_empty() || id.len() > MAX_ID_LENGTH {
        return Err(AppError::BadRequest(format!("Invalid {} id", kind)));
    }

    if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(AppError::BadRequest(format!("Invalid {} id", kind)));
    }

    Ok(())
}
