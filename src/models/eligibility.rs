//! 报关单资格筛选
//!
//! 在报关单进入编排器之前运行的简单布尔判断

use serde::{Deserialize, Serialize};

use crate::models::WorkItem;

/// 资格筛选条件
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EligibilityFilter {
    /// 允许的通道
    pub allowed_channels: Vec<String>,
    /// 视为已放行的状态
    pub cleared_status: String,
    /// 排除的运输方式
    pub excluded_transport_methods: Vec<String>,
    /// 货物描述以这些前缀开头的报关单不处理
    pub reserved_prefixes: Vec<String>,
}

impl Default for EligibilityFilter {
    fn default() -> Self {
        Self {
            allowed_channels: vec!["green".to_string(), "yellow".to_string()],
            cleared_status: "cleared".to_string(),
            excluded_transport_methods: vec!["9".to_string()],
            reserved_prefixes: vec!["#&".to_string()],
        }
    }
}

impl EligibilityFilter {
    pub fn is_eligible(&self, item: &WorkItem) -> bool {
        let channel_ok = self
            .allowed_channels
            .iter()
            .any(|c| c.eq_ignore_ascii_case(item.channel.trim()));
        let cleared = self.cleared_status.eq_ignore_ascii_case(item.status.trim());
        let transport_ok = !self
            .excluded_transport_methods
            .iter()
            .any(|t| t == item.transport_method.trim());
        let description = item.goods_description.trim_start();
        let description_ok = !self
            .reserved_prefixes
            .iter()
            .any(|p| description.starts_with(p.as_str()));

        channel_ok && cleared && transport_ok && description_ok
    }

    /// 保留顺序地筛出符合条件的报关单
    pub fn apply(&self, items: Vec<WorkItem>) -> Vec<WorkItem> {
        items.into_iter().filter(|i| self.is_eligible(i)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn eligible_item() -> WorkItem {
        let mut item = WorkItem::new(
            "305123456780",
            "0101234567",
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            "01B1",
        );
        item.channel = "Green".to_string();
        item.status = "cleared".to_string();
        item.transport_method = "1".to_string();
        item.goods_description = "Steel coils".to_string();
        item
    }

    #[test]
    fn accepts_cleared_item_on_allowed_channel() {
        assert!(EligibilityFilter::default().is_eligible(&eligible_item()));
    }

    #[test]
    fn rejects_each_failing_condition() {
        let filter = EligibilityFilter::default();

        let mut red = eligible_item();
        red.channel = "red".to_string();
        assert!(!filter.is_eligible(&red));

        let mut pending = eligible_item();
        pending.status = "pending".to_string();
        assert!(!filter.is_eligible(&pending));

        let mut excluded = eligible_item();
        excluded.transport_method = "9".to_string();
        assert!(!filter.is_eligible(&excluded));

        let mut reserved = eligible_item();
        reserved.goods_description = "#&internal transfer".to_string();
        assert!(!filter.is_eligible(&reserved));
    }
}
