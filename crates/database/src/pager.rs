use dbkit_orm::{Filter, OrderSpec};

/// Largest limit or offset the engines accept (a signed 64-bit integer).
pub const MAX_WINDOW: u64 = i64::MAX.unsigned_abs();

/// What a paged listing needs: ordering, a filter and a window.
pub trait Pager {
    /// Ordering of the page.
    fn order_by(&self) -> Vec<OrderSpec>;

    /// Filter applied to both the page and the total count.
    fn cond(&self) -> Option<Filter>;

    /// `(limit, offset)` of the page. A limit of `0` means no limit; values
    /// above [`MAX_WINDOW`] are clamped.
    fn limit(&self) -> (u64, u64);
}

/// A [`Pager`] addressed by 1-based page number and page size.
#[derive(Debug, Clone)]
pub struct Paging {
    page: u64,
    size: u64,
    order: Vec<OrderSpec>,
    cond: Option<Filter>,
}

impl Default for Paging {
    fn default() -> Self {
        Self::new(1, 20)
    }
}

impl Paging {
    /// Page `page` (clamped to at least 1) of `size` rows.
    #[must_use]
    pub fn new(page: u64, size: u64) -> Self {
        Self {
            page: page.max(1),
            size,
            order: Vec::new(),
            cond: None,
        }
    }

    /// Append an ordering term.
    #[must_use]
    pub fn order(mut self, spec: OrderSpec) -> Self {
        self.order.push(spec);
        self
    }

    /// Add a filter, combined with any previous one by `AND`.
    #[must_use]
    pub fn r#where(mut self, filter: Filter) -> Self {
        self.cond = Filter::all(self.cond.take(), Some(filter));
        self
    }

    /// The 1-based page number.
    #[must_use]
    pub const fn page(&self) -> u64 {
        self.page
    }

    /// Rows per page.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Number of pages needed to show `total` rows.
    #[must_use]
    pub const fn pages(&self, total: u64) -> u64 {
        if self.size == 0 { 0 } else { total.div_ceil(self.size) }
    }
}

impl Pager for Paging {
    fn order_by(&self) -> Vec<OrderSpec> {
        self.order.clone()
    }

    fn cond(&self) -> Option<Filter> {
        self.cond.clone()
    }

    fn limit(&self) -> (u64, u64) {
        let offset = (self.page - 1).saturating_mul(self.size);
        (self.size.min(MAX_WINDOW), offset.min(MAX_WINDOW))
    }
}
