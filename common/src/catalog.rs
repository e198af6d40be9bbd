//! テンプレートカタログモジュール
//!
//! 組み込みの分類テンプレート（grocery/restaurant/office/utility）と、
//! テンプレートIDごとのキーワードルールを管理する。
//! カスタムカタログはJSONから読み込める。

use crate::error::{Error, Result};
use crate::types::Template;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// キーワードルール（品名にキーワードが含まれればカテゴリを付与）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordRule {
    pub category: String,
    pub keywords: Vec<String>,
}

impl KeywordRule {
    fn new(category: &str, keywords: &[&str]) -> Self {
        Self {
            category: category.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// カタログの1エントリ
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(flatten)]
    pub template: Template,
    #[serde(default)]
    pub rules: Vec<KeywordRule>,
}

/// テンプレートカタログ
#[derive(Debug, Clone, Default)]
pub struct TemplateCatalog {
    entries: Vec<CatalogEntry>,
}

impl TemplateCatalog {
    /// 組み込みカタログ
    pub fn builtin() -> Self {
        Self {
            entries: vec![
                CatalogEntry {
                    template: Template::new(
                        "grocery",
                        "Grocery Receipt",
                        &["Dairy", "Produce", "Meat", "Bakery", "Pantry", "Frozen", "Other"],
                    ),
                    rules: vec![
                        KeywordRule::new("Dairy", &["milk", "cheese", "yogurt"]),
                        KeywordRule::new("Produce", &["apple", "vegetable", "fruit"]),
                        KeywordRule::new("Meat", &["chicken", "beef", "fish"]),
                        KeywordRule::new("Bakery", &["bread", "cake", "muffin"]),
                        KeywordRule::new("Pantry", &["rice", "pasta", "cereal"]),
                    ],
                },
                CatalogEntry {
                    template: Template::new(
                        "restaurant",
                        "Restaurant Bill",
                        &["Appetizers", "Main Course", "Beverages", "Desserts", "Alcohol", "Tax", "Tip"],
                    ),
                    rules: vec![
                        KeywordRule::new("Appetizers", &["salad", "appetizer", "starter"]),
                        KeywordRule::new("Main Course", &["burger", "steak", "pasta"]),
                        KeywordRule::new("Beverages", &["soda", "coffee", "tea"]),
                        KeywordRule::new("Desserts", &["dessert", "cake", "ice"]),
                    ],
                },
                CatalogEntry {
                    template: Template::new(
                        "office",
                        "Office Supplies",
                        &["Stationery", "Electronics", "Furniture", "Kitchen", "Cleaning", "Software", "Other"],
                    ),
                    rules: Vec::new(),
                },
                CatalogEntry {
                    template: Template::new(
                        "utility",
                        "Utility Bill",
                        &["Electricity", "Water", "Gas", "Internet", "Phone", "Cable", "Fees"],
                    ),
                    rules: Vec::new(),
                },
            ],
        }
    }

    /// JSONファイルから読み込み
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// JSON文字列から読み込み（`[{"id", "name", "categories", "rules"}]`）
    pub fn from_json(json: &str) -> Result<Self> {
        let entries: Vec<CatalogEntry> = serde_json::from_str(json)?;
        let catalog = Self { entries };
        catalog.validate()?;
        Ok(catalog)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for entry in &self.entries {
            let template = &entry.template;
            if !seen.insert(template.id.as_str()) {
                return Err(Error::Config(format!("duplicate template id: {}", template.id)));
            }
            for rule in &entry.rules {
                if !template.has_category(&rule.category) {
                    return Err(Error::Config(format!(
                        "template {}: rule category '{}' is not in its categories",
                        template.id, rule.category
                    )));
                }
            }
        }
        Ok(())
    }

    /// 全テンプレート（カタログ順）
    pub fn templates(&self) -> Vec<Template> {
        self.entries.iter().map(|e| e.template.clone()).collect()
    }

    pub fn get(&self, id: &str) -> Result<&Template> {
        self.entries
            .iter()
            .find(|e| e.template.id == id)
            .map(|e| &e.template)
            .ok_or_else(|| Error::TemplateNotFound(id.to_string()))
    }

    /// テンプレートIDに紐づくルール（未登録なら空）
    pub fn rules_for(&self, template_id: &str) -> &[KeywordRule] {
        self.entries
            .iter()
            .find(|e| e.template.id == template_id)
            .map(|e| e.rules.as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 品名からカテゴリを決定（部分一致で最長マッチ）
///
/// - 大文字小文字を区別しない
/// - 同じ長さのキーワードはルール順で先のものを優先
/// - 一致なし、またはテンプレートに無いカテゴリならデフォルトカテゴリ
pub fn match_category(name: &str, template: &Template, rules: &[KeywordRule]) -> String {
    let name = name.to_lowercase();

    let mut best_match: Option<(&str, &str)> = None;
    for rule in rules {
        for keyword in &rule.keywords {
            let keyword_lower = keyword.to_lowercase();
            if keyword_lower.is_empty() || !name.contains(&keyword_lower) {
                continue;
            }
            let longer = best_match
                .map(|(best, _)| keyword.len() > best.len())
                .unwrap_or(true);
            if longer {
                best_match = Some((keyword.as_str(), rule.category.as_str()));
            }
        }
    }

    match best_match {
        Some((_, category)) if template.has_category(category) => category.to_string(),
        _ => template.default_category().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UNCATEGORIZED;

    #[test]
    fn test_builtin_catalog() {
        let catalog = TemplateCatalog::builtin();
        let ids: Vec<String> = catalog.templates().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec!["grocery", "restaurant", "office", "utility"]);
    }

    #[test]
    fn test_builtin_templates_have_categories() {
        // 組み込みテンプレートではUncategorizedへのフォールバックは起きない
        for template in TemplateCatalog::builtin().templates() {
            assert!(!template.categories.is_empty(), "{} has no categories", template.id);
            assert_ne!(template.default_category(), UNCATEGORIZED);
        }
    }

    #[test]
    fn test_get_unknown_template() {
        let catalog = TemplateCatalog::builtin();
        assert!(matches!(catalog.get("pharmacy"), Err(Error::TemplateNotFound(_))));
    }

    #[test]
    fn test_match_category_grocery() {
        let catalog = TemplateCatalog::builtin();
        let grocery = catalog.get("grocery").unwrap();
        let rules = catalog.rules_for("grocery");

        assert_eq!(match_category("Milk", grocery, rules), "Dairy");
        assert_eq!(match_category("Bread", grocery, rules), "Bakery");
        assert_eq!(match_category("Apples", grocery, rules), "Produce");
        assert_eq!(match_category("CHICKEN", grocery, rules), "Meat");
        assert_eq!(match_category("Rice", grocery, rules), "Pantry");
        assert_eq!(match_category("Eggs", grocery, rules), "Dairy");
    }

    #[test]
    fn test_match_category_longest_wins() {
        let template = Template::new("t", "T", &["Drinks", "Snacks"]);
        let rules = vec![
            KeywordRule::new("Drinks", &["tea"]),
            KeywordRule::new("Snacks", &["teacake"]),
        ];
        assert_eq!(match_category("Teacake", &template, &rules), "Snacks");
        assert_eq!(match_category("Iced tea", &template, &rules), "Drinks");
    }

    #[test]
    fn test_match_category_tie_keeps_rule_order() {
        let catalog = TemplateCatalog::builtin();
        let restaurant = catalog.get("restaurant").unwrap();
        let rules = catalog.rules_for("restaurant");
        // "ice" と "tea" は同じ長さ → Beverages が先
        assert_eq!(match_category("Iced Tea", restaurant, rules), "Beverages");
        assert_eq!(match_category("Cheesecake", restaurant, rules), "Desserts");

        let grocery = catalog.get("grocery").unwrap();
        // "fish" と "cake" → Meat が先
        assert_eq!(match_category("Fish Cake", grocery, catalog.rules_for("grocery")), "Meat");
    }

    #[test]
    fn test_match_category_no_rules() {
        let catalog = TemplateCatalog::builtin();
        let office = catalog.get("office").unwrap();
        assert_eq!(match_category("Stapler", office, catalog.rules_for("office")), "Stationery");
    }

    #[test]
    fn test_match_category_empty_template() {
        let template = Template::new("empty", "Empty", &[]);
        let rules = vec![KeywordRule::new("Dairy", &["milk"])];
        assert_eq!(match_category("Milk", &template, &rules), UNCATEGORIZED);
    }

    #[test]
    fn test_from_json() {
        let json = r#"[
            {
                "id": "pharmacy",
                "name": "Pharmacy",
                "categories": ["Medicine", "Cosmetics"],
                "rules": [{"category": "Cosmetics", "keywords": ["lotion"]}]
            }
        ]"#;
        let catalog = TemplateCatalog::from_json(json).unwrap();
        assert_eq!(catalog.len(), 1);
        let template = catalog.get("pharmacy").unwrap();
        assert_eq!(
            match_category("Body Lotion", template, catalog.rules_for("pharmacy")),
            "Cosmetics"
        );
    }

    #[test]
    fn test_from_json_rejects_unknown_rule_category() {
        let json = r#"[{"id": "x", "name": "X", "categories": ["A"],
            "rules": [{"category": "B", "keywords": ["b"]}]}]"#;
        assert!(matches!(TemplateCatalog::from_json(json), Err(Error::Config(_))));
    }

    #[test]
    fn test_from_json_rejects_duplicate_ids() {
        let json = r#"[{"id": "x", "name": "X", "categories": ["A"]},
            {"id": "x", "name": "Y", "categories": ["B"]}]"#;
        assert!(matches!(TemplateCatalog::from_json(json), Err(Error::Config(_))));
    }
}
