//! 表单字段候选标识
//!
//! 海关页面改版时字段 id 经常变化，每个逻辑字段保留一组按优先级排列的备选标识

use phf::phf_map;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 逻辑字段名
pub mod fields {
    pub const DECLARATION_NUMBER: &str = "declaration_number";
    pub const TAX_CODE: &str = "tax_code";
    pub const DECLARATION_DATE: &str = "declaration_date";
    pub const CUSTOMS_OFFICE_CODE: &str = "customs_office_code";
    pub const SUBMIT: &str = "submit";
    /// 查询成功后出现的条码区域
    pub const RESULT: &str = "result";

    /// 页面策略需要填写的字段，按填写顺序
    pub const INPUTS: [&str; 4] = [
        DECLARATION_NUMBER,
        TAX_CODE,
        DECLARATION_DATE,
        CUSTOMS_OFFICE_CODE,
    ];
}

/// 查找方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LookupMode {
    ById,
    ByName,
}

impl LookupMode {
    pub fn other(self) -> Self {
        match self {
            LookupMode::ById => LookupMode::ByName,
            LookupMode::ByName => LookupMode::ById,
        }
    }
}

use LookupMode::{ById, ByName};

static DEFAULT_CANDIDATES: phf::Map<&'static str, &'static [(&'static str, LookupMode)]> = phf_map! {
    "declaration_number" => &[
        ("txtSoToKhai", ById),
        ("ctl00_ContentPlaceHolder1_txtSoToKhai", ById),
        ("soToKhai", ByName),
        ("declarationNumber", ById),
    ],
    "tax_code" => &[
        ("txtMaDoanhNghiep", ById),
        ("ctl00_ContentPlaceHolder1_txtMaDN", ById),
        ("maDoanhNghiep", ByName),
        ("taxCode", ById),
    ],
    "declaration_date" => &[
        ("txtNgayToKhai", ById),
        ("ctl00_ContentPlaceHolder1_txtNgayTK", ById),
        ("ngayToKhai", ByName),
        ("declarationDate", ById),
    ],
    "customs_office_code" => &[
        ("txtMaHaiQuan", ById),
        ("ctl00_ContentPlaceHolder1_ddlHaiQuan", ById),
        ("maHaiQuan", ByName),
        ("customsOffice", ById),
    ],
    "submit" => &[
        ("btnLayThongTin", ById),
        ("ctl00_ContentPlaceHolder1_btnSearch", ById),
        ("btnSearch", ByName),
    ],
    "result" => &[
        ("pnlBarcode", ById),
        ("ctl00_ContentPlaceHolder1_pnlKetQua", ById),
        ("barcodeResult", ByName),
    ],
};

/// 一个候选标识
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldCandidate {
    pub identifier: String,
    /// 优先使用的查找方式
    pub mode: LookupMode,
}

impl FieldCandidate {
    pub fn by_id(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            mode: ById,
        }
    }

    pub fn by_name(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            mode: ByName,
        }
    }
}

/// 逻辑字段 → 有序候选列表
#[derive(Debug, Clone, Default)]
pub struct FieldCandidateSet {
    fields: HashMap<String, Vec<FieldCandidate>>,
}

impl FieldCandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 内置的海关页面候选标识
    pub fn defaults() -> Self {
        let fields = DEFAULT_CANDIDATES
            .entries()
            .map(|(field, candidates)| {
                let list = candidates
                    .iter()
                    .map(|(identifier, mode)| FieldCandidate {
                        identifier: identifier.to_string(),
                        mode: *mode,
                    })
                    .collect();
                (field.to_string(), list)
            })
            .collect();
        Self { fields }
    }

    /// 替换某个字段的候选列表
    pub fn with_field(mut self, field: impl Into<String>, candidates: Vec<FieldCandidate>) -> Self {
        self.fields.insert(field.into(), candidates);
        self
    }

    pub fn candidates(&self, field: &str) -> &[FieldCandidate] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }
}
