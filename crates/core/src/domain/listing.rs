use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::product::Product;
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSort {
    Asc,
    Desc,
}

impl FromStr for PriceSort {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => {
                Err(DomainError::Validation(format!("sort must be `asc` or `desc`, got `{other}`")))
            }
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProductFilter {
    /// Case-insensitive substring match on the category.
    pub category: Option<String>,
    pub status: Option<bool>,
}

/// Unicode case fold used for category matching; stores persist this form next to the category.
pub fn fold_category(category: &str) -> String {
    category.to_lowercase()
}

impl ProductFilter {
    pub fn matches(&self, product: &Product) -> bool {
        let category_ok = self.category.as_ref().map_or(true, |needle| {
            fold_category(&product.category).contains(&fold_category(needle))
        });
        let status_ok = self.status.map_or(true, |status| product.status == status);
        category_ok && status_ok
    }
}

/// Listing parameters exactly as they arrive from a query string.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ListingRequest {
    pub limit: Option<String>,
    pub page: Option<String>,
    pub sort: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageDefaults {
    pub limit: u32,
    pub max_limit: u32,
}

impl Default for PageDefaults {
    fn default() -> Self {
        Self { limit: 10, max_limit: 100 }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProductQuery {
    pub filter: ProductFilter,
    pub sort: Option<PriceSort>,
    pub page: u32,
    pub limit: u32,
}

impl Default for ProductQuery {
    fn default() -> Self {
        Self::first_page(PageDefaults::default().limit)
    }
}

impl ProductQuery {
    pub fn first_page(limit: u32) -> Self {
        Self { filter: ProductFilter::default(), sort: None, page: 1, limit }
    }

    pub fn from_request(request: &ListingRequest, defaults: PageDefaults) -> Result<Self, DomainError> {
        let limit = match non_blank(request.limit.as_deref()) {
            Some(raw) => parse_positive("limit", raw)?.min(defaults.max_limit),
            None => defaults.limit,
        };
        let page = match non_blank(request.page.as_deref()) {
            Some(raw) => parse_positive("page", raw)?,
            None => 1,
        };
        let sort = non_blank(request.sort.as_deref()).map(str::parse::<PriceSort>).transpose()?;
        let status = non_blank(request.status.as_deref()).map(parse_status).transpose()?;
        let category = non_blank(request.category.as_deref()).map(str::to_string);

        Ok(Self { filter: ProductFilter { category, status }, sort, page, limit })
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn parse_positive(field: &str, raw: &str) -> Result<u32, DomainError> {
    match raw.parse::<u32>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(DomainError::Validation(format!("{field} must be a positive integer, got `{raw}`"))),
    }
}

fn parse_status(raw: &str) -> Result<bool, DomainError> {
    match raw.to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(DomainError::Validation(format!("status must be `true` or `false`, got `{raw}`"))),
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total_docs: u64,
    pub limit: u32,
    pub total_pages: u32,
    pub page: u32,
    pub paging_counter: u64,
    pub has_prev_page: bool,
    pub has_next_page: bool,
    pub prev_page: Option<u32>,
    pub next_page: Option<u32>,
}

impl PageMeta {
    pub fn compute(total_docs: u64, page: u32, limit: u32) -> Self {
        let limit = limit.max(1);
        let page = page.max(1);
        let total_pages =
            u32::try_from(total_docs.div_ceil(u64::from(limit))).unwrap_or(u32::MAX).max(1);
        let has_prev_page = page > 1;
        let has_next_page = page < total_pages;

        Self {
            total_docs,
            limit,
            total_pages,
            page,
            paging_counter: u64::from(page - 1) * u64::from(limit) + 1,
            has_prev_page,
            has_next_page,
            prev_page: has_prev_page.then(|| page - 1),
            next_page: has_next_page.then(|| page + 1),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub meta: PageMeta,
}

#[cfg(test)]
mod tests {
    use super::{ListingRequest, PageDefaults, PageMeta, PriceSort, ProductQuery};
    use crate::errors::DomainError;

    fn request(pairs: &[(&str, &str)]) -> ListingRequest {
        let mut request = ListingRequest::default();
        for (key, value) in pairs {
            let value = Some(value.to_string());
            match *key {
                "limit" => request.limit = value,
                "page" => request.page = value,
                "sort" => request.sort = value,
                "category" => request.category = value,
                "status" => request.status = value,
                _ => {}
            }
        }
        request
    }

    #[test]
    fn defaults_apply_when_parameters_are_absent() {
        let query = ProductQuery::from_request(&ListingRequest::default(), PageDefaults::default())
            .expect("defaults");

        assert_eq!(query.page, 1);
        assert_eq!(query.limit, 10);
        assert_eq!(query.sort, None);
        assert_eq!(query.offset(), 0);
    }

    #[test]
    fn parses_sort_filter_and_clamps_limit() {
        let query = ProductQuery::from_request(
            &request(&[("limit", "500"), ("page", "3"), ("sort", "DESC"), ("status", "false"), ("category", "acc")]),
            PageDefaults::default(),
        )
        .expect("valid request");

        assert_eq!(query.limit, 100);
        assert_eq!(query.page, 3);
        assert_eq!(query.offset(), 200);
        assert_eq!(query.sort, Some(PriceSort::Desc));
        assert_eq!(query.filter.status, Some(false));
        assert_eq!(query.filter.category.as_deref(), Some("acc"));
    }

    #[test]
    fn rejects_non_positive_or_non_numeric_paging() {
        for pairs in [[("page", "0")], [("page", "-2")], [("limit", "ten")], [("limit", "0")]] {
            let result = ProductQuery::from_request(&request(&pairs), PageDefaults::default());
            assert!(matches!(result, Err(DomainError::Validation(_))), "{pairs:?}");
        }
    }

    #[test]
    fn rejects_unknown_sort_and_status_values() {
        let sort = ProductQuery::from_request(&request(&[("sort", "price")]), PageDefaults::default());
        let status = ProductQuery::from_request(&request(&[("status", "maybe")]), PageDefaults::default());

        assert!(matches!(sort, Err(DomainError::Validation(_))));
        assert!(matches!(status, Err(DomainError::Validation(_))));
    }

    #[test]
    fn page_meta_for_fifteen_items_in_pages_of_ten() {
        let first = PageMeta::compute(15, 1, 10);
        assert_eq!(first.total_pages, 2);
        assert!(!first.has_prev_page);
        assert!(first.has_next_page);
        assert_eq!(first.prev_page, None);
        assert_eq!(first.next_page, Some(2));
        assert_eq!(first.paging_counter, 1);

        let second = PageMeta::compute(15, 2, 10);
        assert!(second.has_prev_page);
        assert!(!second.has_next_page);
        assert_eq!(second.prev_page, Some(1));
        assert_eq!(second.next_page, None);
        assert_eq!(second.paging_counter, 11);
    }

    #[test]
    fn empty_collection_still_reports_one_page() {
        let meta = PageMeta::compute(0, 1, 10);

        assert_eq!(meta.total_pages, 1);
        assert!(!meta.has_next_page);
    }
}
