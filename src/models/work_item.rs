use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 报关单日期允许的文本格式
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d/%m/%Y", "%Y%m%d"];

/// 一张待取条码的报关单
///
/// 核心只读取其中的标识字段；运输方式、通道等字段只给上游筛选使用
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    #[serde(deserialize_with = "deserialize_code")]
    pub declaration_number: String,
    #[serde(deserialize_with = "deserialize_code")]
    pub tax_code: String,
    #[serde(deserialize_with = "deserialize_date")]
    pub declaration_date: NaiveDate,
    #[serde(deserialize_with = "deserialize_code")]
    pub customs_office_code: String,
    #[serde(default)]
    pub transport_method: String,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub goods_description: String,
}

impl WorkItem {
    pub fn new(
        declaration_number: impl Into<String>,
        tax_code: impl Into<String>,
        declaration_date: NaiveDate,
        customs_office_code: impl Into<String>,
    ) -> Self {
        Self {
            declaration_number: declaration_number.into(),
            tax_code: tax_code.into(),
            declaration_date,
            customs_office_code: customs_office_code.into(),
            transport_method: String::new(),
            channel: String::new(),
            status: String::new(),
            goods_description: String::new(),
        }
    }

    /// 去重用的复合主键
    pub fn identity(&self) -> Identity {
        Identity {
            declaration_number: self.declaration_number.clone(),
            tax_code: self.tax_code.clone(),
            declaration_date: self.declaration_date,
            customs_office_code: self.customs_office_code.clone(),
        }
    }
}

/// 报关单标识（去重主键）
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identity {
    pub declaration_number: String,
    pub tax_code: String,
    pub declaration_date: NaiveDate,
    pub customs_office_code: String,
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.declaration_number,
            self.tax_code,
            self.declaration_date.format("%Y-%m-%d"),
            self.customs_office_code
        )
    }
}

/// 解析报关单日期，支持多种常见写法
pub fn parse_declaration_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
}

// 号码在导出表里经常被写成整数
fn deserialize_code<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Visitor;

    struct CodeVisitor;

    impl<'de> Visitor<'de> for CodeVisitor {
        type Value = String;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string or integer code")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.trim().to_string())
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }
    }

    deserializer.deserialize_any(CodeVisitor)
}

fn deserialize_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Visitor;

    struct DateVisitor;

    impl<'de> Visitor<'de> for DateVisitor {
        type Value = NaiveDate;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a date like 2024-03-15, 15/03/2024 or 20240315")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            parse_declaration_date(value)
                .ok_or_else(|| E::custom(format!("无法解析日期: {}", value)))
        }

        fn visit_map<A>(self, map: A) -> Result<Self::Value, A::Error>
        where
            A: serde::de::MapAccess<'de>,
        {
            // TOML 原生日期会以 map 形式出现
            let datetime = toml::value::Datetime::deserialize(
                serde::de::value::MapAccessDeserializer::new(map),
            )?;
            parse_declaration_date(&datetime.to_string()).ok_or_else(|| {
                serde::de::Error::custom(format!("无法解析日期: {}", datetime))
            })
        }
    }

    deserializer.deserialize_any(DateVisitor)
}
