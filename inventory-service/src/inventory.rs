//! Reads and writes against the products/reservations tables.
//!
//! Queries only narrow reservations by date so that every row the calculator
//! might need is loaded. Date narrowing relies on the table's CHECK constraints
//! (`quantity > 0`, `end_date >= start_date`), so no malformed row can fall out
//! of a date filter. Status filtering happens in `shared`, which also rejects
//! rows with an unknown status instead of skipping them.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use shared::*;
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::InventoryError;
use crate::models::*;
use crate::schema::*;

pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Serialize)]
pub struct CatalogEntry {
    pub product_id: Uuid,
    pub name: String,
    #[serde(flatten)]
    pub stock: StockSnapshot,
    pub current_renters: Vec<RenterSummary>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogQuery {
    #[serde(default)]
    pub include_unavailable: bool,
    #[serde(default = "default_published_only")]
    pub published_only: bool,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_per_page")]
    pub per_page: i64,
}

fn default_published_only() -> bool {
    true
}

fn default_page() -> i64 {
    1
}

fn default_per_page() -> i64 {
    20
}

impl Default for CatalogQuery {
    fn default() -> Self {
        Self {
            include_unavailable: false,
            published_only: default_published_only(),
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

impl CatalogQuery {
    pub fn validate(&self) -> Result<(), AvailabilityError> {
        if self.page < 1 {
            return Err(AvailabilityError::invalid("page", "pages start at 1"));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&self.per_page) {
            return Err(AvailabilityError::invalid(
                "per_page",
                format!("must be between 1 and {}", MAX_PAGE_SIZE),
            ));
        }
        self.offset().map(|_| ())
    }

    pub fn offset(&self) -> Result<usize, AvailabilityError> {
        (self.page - 1)
            .checked_mul(self.per_page)
            .and_then(|offset| usize::try_from(offset).ok())
            .ok_or_else(|| AvailabilityError::invalid("page", format!("page {} is out of range", self.page)))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogPage {
    pub products: Vec<CatalogEntry>,
    pub page: i64,
    pub per_page: i64,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BookingOutcome {
    Reserved {
        reservation: Reservation,
        availability: AvailabilityResult,
    },
    AlreadyReserved {
        reservation: Reservation,
    },
    Rejected {
        availability: AvailabilityResult,
    },
}

/// What the booking transaction should do once its reads are done.
#[derive(Debug, Clone)]
pub enum Admission {
    AlreadyReserved(Reservation),
    Rejected(AvailabilityResult),
    Admit(AvailabilityResult),
}

/// Decides a booking for one order line.
///
/// `order_rows` are the order's existing rows for the product and
/// `overlapping` every row of the product overlapping the requested window.
pub fn decide_booking(
    total: Option<i64>,
    order_rows: Vec<Reservation>,
    overlapping: &[Reservation],
    request: &AvailabilityRequest,
) -> Result<Admission, AvailabilityError> {
    for reservation in order_rows {
        if reservation.order_status()?.is_active_reservation() {
            return Ok(Admission::AlreadyReserved(reservation));
        }
    }

    let availability = calculate_window_availability(total, &to_records(overlapping)?, request)?;
    if availability.is_full() {
        Ok(Admission::Admit(availability))
    } else {
        Ok(Admission::Rejected(availability))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StatusChange {
    Applied { updated: usize },
    Rejected { availability: AvailabilityResult },
}

/// Rows of an order that start holding stock when it moves to `status`.
pub fn rows_to_reactivate(
    order_rows: &[Reservation],
    status: OrderStatus,
) -> Result<Vec<Reservation>, AvailabilityError> {
    if !status.is_active_reservation() {
        return Ok(Vec::new());
    }
    let mut reactivated = Vec::new();
    for row in order_rows {
        if !row.order_status()?.is_active_reservation() {
            reactivated.push(row.clone());
        }
    }
    Ok(reactivated)
}

/// Re-checks reactivated rows of a single product one after another.
///
/// `product_rows` are all rows of the product around the reactivated windows.
/// The rows being reactivated are left out of them and counted back in, already
/// active, once they have passed their own check. Returns the first result that
/// is not `Full`.
pub fn check_reactivation(
    total: Option<i64>,
    product_rows: &[Reservation],
    reactivated: &[Reservation],
    status: OrderStatus,
) -> Result<Option<AvailabilityResult>, AvailabilityError> {
    let mut committed = Vec::with_capacity(product_rows.len());
    for row in product_rows {
        if !reactivated.iter().any(|r| r.id == row.id) {
            committed.push(row.to_record()?);
        }
    }

    for row in reactivated {
        let request = AvailabilityRequest {
            product_id: row.product_id,
            requested_quantity: i64::from(row.quantity),
            window: TimeWindow {
                start_date: row.start_date,
                end_date: row.end_date,
            },
        };
        let availability = calculate_window_availability(total, &committed, &request)?;
        if !availability.is_full() {
            return Ok(Some(availability));
        }
        let mut record = row.to_record()?;
        record.status = status;
        committed.push(record);
    }
    Ok(None)
}

pub fn catalog_entry(
    product: &Product,
    rows: &[Reservation],
    now: DateTime<Utc>,
) -> Result<CatalogEntry, AvailabilityError> {
    let mut records = Vec::with_capacity(rows.len());
    let mut current_renters = Vec::new();
    for row in rows {
        let record = row.to_record()?;
        if is_current_rental(&record, now) {
            current_renters.push(RenterSummary::new(&record, &row.customer_name));
        }
        records.push(record);
    }

    Ok(CatalogEntry {
        product_id: product.id,
        name: product.name.clone(),
        stock: stock_at(i64::from(product.total_stock), &records, now)?,
        current_renters,
    })
}

/// Drops unavailable products unless asked for, then slices out one page.
pub fn paginate(entries: Vec<CatalogEntry>, query: &CatalogQuery) -> Result<CatalogPage, AvailabilityError> {
    query.validate()?;
    let skip = query.offset()?;
    let listed: Vec<CatalogEntry> = entries
        .into_iter()
        .filter(|entry| query.include_unavailable || entry.stock.available_quantity > 0)
        .collect();
    let total = listed.len();
    let products = listed
        .into_iter()
        .skip(skip)
        .take(query.per_page as usize)
        .collect();

    Ok(CatalogPage {
        products,
        page: query.page,
        per_page: query.per_page,
        total,
    })
}

pub async fn load_catalog(
    conn: &mut AsyncPgConnection,
    query: &CatalogQuery,
    now: DateTime<Utc>,
) -> Result<CatalogPage, InventoryError> {
    query.validate()?;

    let mut product_query = products::table.order(products::name.asc()).into_boxed();
    if query.published_only {
        product_query = product_query.filter(products::is_published.eq(true));
    }
    let product_rows = product_query.load::<Product>(conn).await?;

    let ids: Vec<Uuid> = product_rows.iter().map(|p| p.id).collect();
    let pending = reservations::table
        .filter(reservations::product_id.eq_any(ids))
        .filter(reservations::end_date.ge(now))
        .order(reservations::start_date.asc())
        .load::<Reservation>(conn)
        .await?;

    let mut by_product: HashMap<Uuid, Vec<Reservation>> = HashMap::new();
    for row in pending {
        by_product.entry(row.product_id).or_default().push(row);
    }

    let entries = product_rows
        .iter()
        .map(|product| {
            let rows = by_product.get(&product.id).map(Vec::as_slice).unwrap_or(&[]);
            catalog_entry(product, rows, now)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(paginate(entries, query)?)
}

pub async fn load_catalog_entry(
    conn: &mut AsyncPgConnection,
    product_id: Uuid,
    now: DateTime<Utc>,
) -> Result<CatalogEntry, InventoryError> {
    let product = products::table
        .find(product_id)
        .first::<Product>(conn)
        .await
        .optional()?
        .ok_or_else(|| InventoryError::NotFound(format!("product {}", product_id)))?;

    let pending = reservations::table
        .filter(reservations::product_id.eq(product_id))
        .filter(reservations::end_date.ge(now))
        .order(reservations::start_date.asc())
        .load::<Reservation>(conn)
        .await?;

    Ok(catalog_entry(&product, &pending, now)?)
}

async fn overlapping_rows(
    conn: &mut AsyncPgConnection,
    product_id: Uuid,
    window: &TimeWindow,
) -> Result<Vec<Reservation>, InventoryError> {
    let rows = reservations::table
        .filter(reservations::product_id.eq(product_id))
        .filter(reservations::end_date.gt(window.start_date))
        .filter(reservations::start_date.lt(window.end_date))
        .order(reservations::start_date.asc())
        .load::<Reservation>(conn)
        .await?;
    Ok(rows)
}

fn to_records(rows: &[Reservation]) -> Result<Vec<ReservationRecord>, AvailabilityError> {
    rows.iter().map(Reservation::to_record).collect()
}

/// Snapshot answer for a quotation. A missing product is zero stock.
pub async fn window_availability(
    conn: &mut AsyncPgConnection,
    request: &AvailabilityRequest,
) -> Result<AvailabilityResult, InventoryError> {
    request.validate()?;

    let total = products::table
        .find(request.product_id)
        .select(products::total_stock)
        .first::<i32>(conn)
        .await
        .optional()?
        .map(i64::from);
    if total.is_none() {
        debug!("No stock record for product {}", request.product_id);
    }

    let rows = overlapping_rows(conn, request.product_id, &request.window).await?;
    Ok(calculate_window_availability(total, &to_records(&rows)?, request)?)
}

/// Admits a booking only if the whole quantity is free for its window.
///
/// The product row is locked and the overlapping reservations re-read inside
/// the same transaction as the insert, so two concurrent bookings for one
/// product cannot both observe the same free stock.
pub async fn reserve_stock(
    conn: &mut AsyncPgConnection,
    data: ReservationData,
) -> Result<BookingOutcome, InventoryError> {
    let request = data.availability_request();
    request.validate()?;

    conn.transaction::<_, InventoryError, _>(|conn| {
        Box::pin(async move {
            let total = products::table
                .find(data.product_id)
                .for_update()
                .first::<Product>(conn)
                .await
                .optional()?
                .map(|product| i64::from(product.total_stock));

            let order_rows = reservations::table
                .filter(reservations::order_id.eq(data.order_id))
                .filter(reservations::product_id.eq(data.product_id))
                .load::<Reservation>(conn)
                .await?;
            let rows = overlapping_rows(conn, data.product_id, &request.window).await?;

            let availability = match decide_booking(total, order_rows, &rows, &request)? {
                Admission::AlreadyReserved(reservation) => {
                    return Ok(BookingOutcome::AlreadyReserved { reservation });
                }
                Admission::Rejected(availability) => {
                    info!(
                        "Booking for order {} rejected: {}",
                        data.order_number, availability.message
                    );
                    return Ok(BookingOutcome::Rejected { availability });
                }
                Admission::Admit(availability) => availability,
            };

            let reservation = diesel::insert_into(reservations::table)
                .values(&NewReservation::confirmed(&data))
                .get_result::<Reservation>(conn)
                .await?;

            info!(
                "Reserved {} units of product {} for order {}",
                reservation.quantity, reservation.product_id, reservation.order_number
            );
            Ok(BookingOutcome::Reserved {
                reservation,
                availability,
            })
        })
    })
    .await
}

/// Moves every reservation of an order to `status`.
///
/// Rows that go from an inactive status back to an active one are admitted
/// again, under the same product lock and re-check as a new booking. If any of
/// them no longer fits, nothing is updated.
pub async fn set_order_status(
    conn: &mut AsyncPgConnection,
    order_id: Uuid,
    status: OrderStatus,
) -> Result<StatusChange, InventoryError> {
    conn.transaction::<_, InventoryError, _>(|conn| {
        Box::pin(async move {
            let order_rows = reservations::table
                .filter(reservations::order_id.eq(order_id))
                .order(reservations::start_date.asc())
                .load::<Reservation>(conn)
                .await?;
            let reactivated = rows_to_reactivate(&order_rows, status)?;

            let mut product_ids: Vec<Uuid> = reactivated.iter().map(|r| r.product_id).collect();
            product_ids.sort();
            product_ids.dedup();

            for product_id in product_ids {
                let total = products::table
                    .find(product_id)
                    .for_update()
                    .first::<Product>(conn)
                    .await
                    .optional()?
                    .map(|product| i64::from(product.total_stock));

                let lines: Vec<Reservation> = reactivated
                    .iter()
                    .filter(|r| r.product_id == product_id)
                    .cloned()
                    .collect();
                let earliest = lines.iter().map(|r| r.start_date).min();
                let latest = lines.iter().map(|r| r.end_date).max();
                let (Some(start_date), Some(end_date)) = (earliest, latest) else {
                    continue;
                };

                let rows = overlapping_rows(conn, product_id, &TimeWindow { start_date, end_date }).await?;
                if let Some(availability) = check_reactivation(total, &rows, &lines, status)? {
                    info!(
                        "Order {} cannot move to {}: {}",
                        order_id, status, availability.message
                    );
                    return Ok(StatusChange::Rejected { availability });
                }
            }

            let updated = diesel::update(reservations::table.filter(reservations::order_id.eq(order_id)))
                .set((
                    reservations::status.eq(status.as_str()),
                    reservations::updated_at.eq(Some(Utc::now())),
                ))
                .execute(conn)
                .await?;
            Ok(StatusChange::Applied { updated })
        })
    })
    .await
}
