//! アイテムストア
//!
//! 抽出明細の順序付きリストを保持し、追加・編集・削除を提供する。
//! 合計とカテゴリ別小計は読み出しのたびに再計算する。

use crate::aggregate::{self, CategoryTotal};
use crate::error::{Error, Result};
use crate::parser::parse_amount;
use crate::types::{ExtractedItem, Template, UNCATEGORIZED};
use std::collections::HashSet;

/// 新しい明細ID
pub fn new_item_id() -> String {
    format!("item-{}", uuid::Uuid::new_v4())
}

/// 編集対象フィールド（1回の更新で1フィールドのみ）
#[derive(Debug, Clone, PartialEq)]
pub enum ItemField {
    Name(String),
    Category(String),
    Amount(f64),
}

impl ItemField {
    /// フィールド名と入力文字列から変換
    pub fn parse(field: &str, value: &str) -> Result<Self> {
        match field.trim().to_lowercase().as_str() {
            "name" => Ok(ItemField::Name(value.trim().to_string())),
            "category" => Ok(ItemField::Category(value.trim().to_string())),
            "amount" => parse_amount(value)
                .map(ItemField::Amount)
                .ok_or_else(|| Error::validation("amount", format!("not a number: '{}'", value))),
            other => Err(Error::validation("field", format!("unknown field '{}'", other))),
        }
    }

    pub fn field_name(&self) -> &'static str {
        match self {
            ItemField::Name(_) => "name",
            ItemField::Category(_) => "category",
            ItemField::Amount(_) => "amount",
        }
    }

    fn apply(self, item: &mut ExtractedItem) {
        match self {
            ItemField::Name(name) => item.name = name,
            ItemField::Category(category) => item.category = category,
            ItemField::Amount(amount) => item.amount = amount,
        }
    }
}

/// 編集中のコピー（コミットするまでストアには反映されない）
#[derive(Debug, Clone, PartialEq)]
pub struct ItemDraft {
    item: ExtractedItem,
}

impl ItemDraft {
    pub fn id(&self) -> &str {
        &self.item.id
    }

    pub fn item(&self) -> &ExtractedItem {
        &self.item
    }

    pub fn set(&mut self, field: ItemField) {
        field.apply(&mut self.item);
    }
}

#[derive(Debug, Clone, Default)]
pub struct ItemStore {
    items: Vec<ExtractedItem>,
    /// 現在のテンプレートのカテゴリ
    categories: Vec<String>,
}

impl ItemStore {
    pub fn new(categories: Vec<String>) -> Self {
        Self {
            items: Vec::new(),
            categories,
        }
    }

    pub fn for_template(template: &Template) -> Self {
        Self::new(template.categories.clone())
    }

    /// テンプレート変更時にカテゴリを差し替える
    ///
    /// 新しいカテゴリに無い明細は `Uncategorized` に戻し、その件数を返す。
    pub fn set_categories(&mut self, categories: Vec<String>) -> usize {
        self.categories = categories;
        let mut reassigned = 0;
        for item in &mut self.items {
            if item.category != UNCATEGORIZED && !self.categories.contains(&item.category) {
                item.category = UNCATEGORIZED.to_string();
                reassigned += 1;
            }
        }
        reassigned
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn default_category(&self) -> &str {
        self.categories
            .first()
            .map(|c| c.as_str())
            .unwrap_or(UNCATEGORIZED)
    }

    pub fn items(&self) -> &[ExtractedItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&ExtractedItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// 空の明細を末尾に追加（デフォルトカテゴリ、金額0）
    pub fn add_item(&mut self) -> &ExtractedItem {
        let item = ExtractedItem {
            id: new_item_id(),
            name: String::new(),
            category: self.default_category().to_string(),
            amount: 0.0,
        };
        self.items.push(item);
        &self.items[self.items.len() - 1]
    }

    /// 既存の明細を末尾に追加
    pub fn insert(&mut self, item: ExtractedItem) -> Result<()> {
        if self.get(&item.id).is_some() {
            return Err(Error::DuplicateId(item.id));
        }
        self.validate_category(&item.category)?;
        self.validate_amount(item.amount)?;
        self.items.push(item);
        Ok(())
    }

    /// 全明細を置き換え（パイプライン結果の反映）
    ///
    /// 検証に失敗した場合は何も変更しない
    pub fn replace_all(&mut self, items: Vec<ExtractedItem>) -> Result<()> {
        let mut seen = HashSet::new();
        for item in &items {
            if !seen.insert(item.id.as_str()) {
                return Err(Error::DuplicateId(item.id.clone()));
            }
            self.validate_amount(item.amount)?;
        }
        self.items = items;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// 1明細の1フィールドを更新
    pub fn update_item(&mut self, id: &str, field: ItemField) -> Result<&ExtractedItem> {
        self.validate_field(&field)?;
        let index = self.index_of(id)?;
        field.apply(&mut self.items[index]);
        Ok(&self.items[index])
    }

    /// 明細を削除して返す
    pub fn delete_item(&mut self, id: &str) -> Result<ExtractedItem> {
        let index = self.index_of(id)?;
        Ok(self.items.remove(index))
    }

    /// 編集用コピーを取得
    pub fn begin_edit(&self, id: &str) -> Result<ItemDraft> {
        let index = self.index_of(id)?;
        Ok(ItemDraft {
            item: self.items[index].clone(),
        })
    }

    /// 編集用コピーを反映（編集中に削除されていればNotFound）
    pub fn commit_edit(&mut self, draft: ItemDraft) -> Result<&ExtractedItem> {
        self.validate_category(&draft.item.category)?;
        self.validate_amount(draft.item.amount)?;
        let index = self.index_of(&draft.item.id)?;
        self.items[index] = draft.item;
        Ok(&self.items[index])
    }

    pub fn total(&self) -> f64 {
        aggregate::total(&self.items)
    }

    pub fn category_totals(&self) -> Vec<CategoryTotal> {
        aggregate::category_totals(&self.items)
    }

    fn index_of(&self, id: &str) -> Result<usize> {
        self.items
            .iter()
            .position(|item| item.id == id)
            .ok_or_else(|| Error::ItemNotFound(id.to_string()))
    }

    fn validate_field(&self, field: &ItemField) -> Result<()> {
        match field {
            ItemField::Category(category) => self.validate_category(category),
            ItemField::Amount(amount) => self.validate_amount(*amount),
            ItemField::Name(_) => Ok(()),
        }
    }

    fn validate_category(&self, category: &str) -> Result<()> {
        if category == UNCATEGORIZED || self.categories.iter().any(|c| c == category) {
            Ok(())
        } else {
            Err(Error::validation(
                "category",
                format!("'{}' is not one of {:?}", category, self.categories),
            ))
        }
    }

    fn validate_amount(&self, amount: f64) -> Result<()> {
        if amount.is_finite() {
            Ok(())
        } else {
            Err(Error::validation("amount", "amount must be a finite number"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn grocery_store() -> ItemStore {
        ItemStore::new(vec!["Dairy".into(), "Produce".into(), "Bakery".into()])
    }

    fn item(id: &str, name: &str, category: &str, amount: f64) -> ExtractedItem {
        ExtractedItem {
            id: id.to_string(),
            name: name.to_string(),
            category: category.to_string(),
            amount,
        }
    }

    #[test]
    fn test_add_item_defaults() {
        let mut store = grocery_store();
        let added = store.add_item().clone();
        assert_eq!(added.name, "");
        assert_eq!(added.category, "Dairy");
        assert_eq!(added.amount, 0.0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_set_categories_resets_items_outside_new_template() {
        let mut store = grocery_store();
        store
            .replace_all(vec![
                item("a", "Milk", "Dairy", 2.49),
                item("b", "Mystery", UNCATEGORIZED, 1.00),
            ])
            .unwrap();

        let reassigned = store.set_categories(vec!["Entrees".into(), "Tip".into()]);
        assert_eq!(reassigned, 1);
        let categories: Vec<&str> = store.items().iter().map(|i| i.category.as_str()).collect();
        assert_eq!(categories, vec![UNCATEGORIZED, UNCATEGORIZED]);

        // 名前だけの変更は新しいテンプレートでも通る
        let mut draft = store.begin_edit("a").unwrap();
        draft.set(ItemField::Name("Whole Milk".into()));
        assert_eq!(store.commit_edit(draft).unwrap().name, "Whole Milk");
    }

    #[test]
    fn test_set_categories_keeps_shared_categories() {
        let mut store = grocery_store();
        store.replace_all(vec![item("a", "Bread", "Bakery", 3.99)]).unwrap();
        assert_eq!(store.set_categories(vec!["Bakery".into()]), 0);
        assert_eq!(store.get("a").unwrap().category, "Bakery");
    }

    #[test]
    fn test_add_item_without_template() {
        let mut store = ItemStore::default();
        assert_eq!(store.add_item().category, UNCATEGORIZED);
    }

    #[test]
    fn test_add_and_delete_keep_ids_unique_and_order() {
        let mut store = grocery_store();
        let ids: Vec<String> = (0..5).map(|_| store.add_item().id.clone()).collect();

        store.delete_item(&ids[1]).unwrap();
        store.delete_item(&ids[3]).unwrap();
        let extra = store.add_item().id.clone();

        let remaining: Vec<&str> = store.items().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(remaining, vec![ids[0].as_str(), ids[2].as_str(), ids[4].as_str(), extra.as_str()]);

        let unique: HashSet<&str> = remaining.iter().copied().collect();
        assert_eq!(unique.len(), remaining.len());
    }

    #[test]
    fn test_update_item_single_field() {
        let mut store = grocery_store();
        store.insert(item("a", "Milk", "Dairy", 3.99)).unwrap();

        let updated = store.update_item("a", ItemField::Amount(4.25)).unwrap();
        assert_eq!(updated.amount, 4.25);
        assert_eq!(updated.name, "Milk");
        assert_eq!(updated.category, "Dairy");
    }

    #[test]
    fn test_update_missing_item_is_reported() {
        let mut store = grocery_store();
        let err = store.update_item("missing", ItemField::Name("x".into())).unwrap_err();
        assert!(matches!(err, Error::ItemNotFound(_)));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_update_rejects_unknown_category() {
        let mut store = grocery_store();
        store.insert(item("a", "Milk", "Dairy", 3.99)).unwrap();
        let err = store.update_item("a", ItemField::Category("Meat".into())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(store.get("a").unwrap().category, "Dairy");

        // センチネルは常に許可
        store.update_item("a", ItemField::Category(UNCATEGORIZED.into())).unwrap();
    }

    #[test]
    fn test_update_rejects_nan_amount() {
        let mut store = grocery_store();
        store.insert(item("a", "Milk", "Dairy", 3.99)).unwrap();
        assert!(store.update_item("a", ItemField::Amount(f64::NAN)).is_err());
        assert_eq!(store.total(), 3.99);
    }

    #[test]
    fn test_delete_returns_item() {
        let mut store = grocery_store();
        store.insert(item("a", "Milk", "Dairy", 3.99)).unwrap();
        let removed = store.delete_item("a").unwrap();
        assert_eq!(removed.name, "Milk");
        assert!(store.is_empty());
        assert!(matches!(store.delete_item("a"), Err(Error::ItemNotFound(_))));
    }

    #[test]
    fn test_insert_duplicate_id() {
        let mut store = grocery_store();
        store.insert(item("a", "Milk", "Dairy", 3.99)).unwrap();
        let err = store.insert(item("a", "Bread", "Bakery", 2.49)).unwrap_err();
        assert!(matches!(err, Error::DuplicateId(_)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_replace_all_rejects_duplicates_without_mutation() {
        let mut store = grocery_store();
        store.insert(item("keep", "Milk", "Dairy", 3.99)).unwrap();

        let result = store.replace_all(vec![
            item("x", "Bread", "Bakery", 2.49),
            item("x", "Apples", "Produce", 5.99),
        ]);
        assert!(result.is_err());
        assert_eq!(store.items()[0].id, "keep");
    }

    #[test]
    fn test_draft_edit_and_commit() {
        let mut store = grocery_store();
        store.insert(item("a", "Milk", "Dairy", 3.99)).unwrap();

        let mut draft = store.begin_edit("a").unwrap();
        draft.set(ItemField::Name("Oat Milk".into()));
        draft.set(ItemField::Amount(4.49));
        // コミット前はストアに影響しない
        assert_eq!(store.get("a").unwrap().name, "Milk");

        store.commit_edit(draft).unwrap();
        let committed = store.get("a").unwrap();
        assert_eq!(committed.name, "Oat Milk");
        assert_eq!(committed.amount, 4.49);
    }

    #[test]
    fn test_commit_after_delete_is_not_found() {
        let mut store = grocery_store();
        store.insert(item("a", "Milk", "Dairy", 3.99)).unwrap();
        let draft = store.begin_edit("a").unwrap();
        store.delete_item("a").unwrap();
        assert!(matches!(store.commit_edit(draft), Err(Error::ItemNotFound(_))));
    }

    #[test]
    fn test_totals_follow_mutations() {
        let mut store = grocery_store();
        store.insert(item("a", "Milk", "Dairy", 3.99)).unwrap();
        store.insert(item("b", "Bread", "Bakery", 2.49)).unwrap();
        store.insert(item("c", "Cheese", "Dairy", 5.0)).unwrap();

        assert_eq!(store.total(), 3.99 + 2.49 + 5.0);
        // 繰り返し読んでも変わらない
        assert_eq!(store.total(), store.total());

        store.update_item("c", ItemField::Category("Bakery".into())).unwrap();
        store.delete_item("a").unwrap();

        let totals = store.category_totals();
        assert_eq!(totals.len(), 1);
        assert_eq!(totals[0].category, "Bakery");
        assert_eq!(totals[0].total, 2.49 + 5.0);
        assert_eq!(store.total(), 2.49 + 5.0);
    }

    #[test]
    fn test_item_field_parse() {
        assert_eq!(ItemField::parse("name", " Milk ").unwrap(), ItemField::Name("Milk".into()));
        assert_eq!(ItemField::parse("Amount", "3,50").unwrap(), ItemField::Amount(3.5));
        assert_eq!(
            ItemField::parse("category", "Dairy").unwrap(),
            ItemField::Category("Dairy".into())
        );
        assert!(ItemField::parse("amount", "cheap").is_err());
        assert!(ItemField::parse("price", "1").is_err());
    }
}
