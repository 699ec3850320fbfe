//! Package ledger service
//!
//! Forecasts, warehouse measurements, and pre-arrival edits. Every write is
//! guarded by the package revision, so two staff members measuring the same
//! package cannot silently overwrite each other.

use std::sync::Arc;

use tracing::{info, warn};
use validator::Validate;

use super::rate_table::RateTableStore;
use crate::application::dto::{ForecastRequest, PackageEditRequest};
use crate::application::ports::{FileStore, Notification, NotificationCategory, NotificationSink};
use crate::domain::package::{NewPackage, Package, PackageEdit, PackageStatus};
use crate::domain::pricing::{price_boxes, quote_boxes, CargoBox, PricedBox, ShipmentQuote};
use crate::domain::{DomainError, DomainResult, RepositoryProvider};

pub struct PackageService {
    repos: Arc<dyn RepositoryProvider>,
    rates: Arc<RateTableStore>,
    files: Arc<dyn FileStore>,
    notifier: Arc<dyn NotificationSink>,
}

impl PackageService {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        rates: Arc<RateTableStore>,
        files: Arc<dyn FileStore>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            repos,
            rates,
            files,
            notifier,
        }
    }

    /// Customer announces an incoming package.
    pub async fn forecast(&self, request: ForecastRequest) -> DomainResult<Package> {
        request.validate()?;
        let new = NewPackage::from(request);
        if let Some(image) = &new.image_path {
            self.ensure_file(image).await?;
        }

        let package = self.repos.packages().insert(new).await?;
        info!(
            package_id = package.id,
            owner = package.owner_user_id,
            tracking_number = package.tracking_number.as_str(),
            "Package forecast"
        );
        Ok(package)
    }

    /// Warehouse records the boxes of a package and prices them against the
    /// current rate table. The first measurement marks the package arrived.
    pub async fn record_measurement(
        &self,
        package_id: i32,
        boxes: Vec<CargoBox>,
    ) -> DomainResult<Package> {
        let table = self.rates.snapshot();
        let mut package = self.get(package_id).await?;
        package.ensure_measurable()?;

        let priced = price_boxes(&boxes, &table)?;
        let fallbacks = priced.iter().filter(|b| b.quote.fell_back).count();
        if fallbacks > 0 {
            metrics::counter!("freight_rate_fallbacks_total").increment(fallbacks as u64);
        }

        let expected_revision = package.revision;
        let first_arrival = package.status == PackageStatus::Pending;
        package.apply_measurement(priced)?;
        self.repos
            .packages()
            .save_measurement(&package, expected_revision)
            .await?;

        metrics::counter!("freight_packages_measured_total").increment(1);
        info!(
            package_id,
            boxes = package.boxes.len(),
            fee = package.computed_fee,
            rate_version = table.version(),
            first_arrival,
            "Package measured"
        );

        let (title, verb) = if first_arrival {
            ("Package arrived", "arrived at the warehouse")
        } else {
            ("Package re-measured", "was re-measured")
        };
        self.notifier.notify(
            Notification::new(
                package.owner_user_id,
                NotificationCategory::Package,
                title,
                format!(
                    "Package {} {}; fee {}",
                    package.tracking_number, verb, package.computed_fee
                ),
            )
            .with_link(format!("/packages/{}", package.id)),
        );
        Ok(package)
    }

    /// Customer edit, only while the package is pending.
    pub async fn edit(&self, package_id: i32, request: PackageEditRequest) -> DomainResult<Package> {
        request.validate()?;
        let edit = PackageEdit::from(request);
        if let Some(Some(image)) = &edit.image_path {
            self.ensure_file(image).await?;
        }

        let mut package = self.get(package_id).await?;
        let expected_revision = package.revision;
        let replaced_image = package.apply_edit(edit)?;
        self.repos
            .packages()
            .save_details(&package, expected_revision)
            .await?;

        info!(package_id, "Package edited");
        if let Some(old) = replaced_image {
            self.discard_file(&old).await;
        }
        Ok(package)
    }

    /// Delete a package that has not arrived yet.
    pub async fn delete(&self, package_id: i32) -> DomainResult<()> {
        let package = self.get(package_id).await?;
        package.ensure_pending("delete")?;
        self.repos.packages().delete_pending(package_id).await?;

        info!(package_id, "Package deleted");
        if let Some(image) = &package.image_path {
            self.discard_file(image).await;
        }
        Ok(())
    }

    /// Price boxes that are not stored anywhere, for an estimate.
    pub fn quote(
        &self,
        boxes: &[CargoBox],
        remote_area_rate: i64,
    ) -> DomainResult<(Vec<PricedBox>, ShipmentQuote)> {
        if remote_area_rate < 0 {
            return Err(DomainError::Validation(
                "remote area rate must not be negative".into(),
            ));
        }
        quote_boxes(boxes, remote_area_rate, &self.rates.snapshot())
    }

    pub async fn get(&self, package_id: i32) -> DomainResult<Package> {
        self.repos
            .packages()
            .find_by_id(package_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Package", package_id))
    }

    pub async fn list_for_owner(&self, owner_user_id: i32) -> DomainResult<Vec<Package>> {
        self.repos.packages().find_by_owner(owner_user_id).await
    }

    async fn ensure_file(&self, reference: &str) -> DomainResult<()> {
        if self.files.exists(reference).await {
            Ok(())
        } else {
            Err(DomainError::Validation(format!(
                "file '{}' does not exist",
                reference
            )))
        }
    }

    /// Best effort; the package row is already committed.
    async fn discard_file(&self, reference: &str) {
        if let Err(e) = self.files.delete(reference).await {
            warn!(file = reference, error = %e, "Could not delete replaced file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::errors::ErrorKind;
    use crate::test_support::{standard_box, Harness};
    use rust_decimal_macros::dec;

    fn forecast(owner: i32, tracking: &str) -> ForecastRequest {
        ForecastRequest {
            owner_user_id: owner,
            tracking_number: tracking.into(),
            product_name: "Desk lamp".into(),
            quantity: 2,
            image_path: None,
        }
    }

    #[tokio::test]
    async fn forecast_then_measure() {
        let h = Harness::new().await;
        let p = h.packages.forecast(forecast(1, " TN-100 ")).await.unwrap();
        assert_eq!(p.status, PackageStatus::Pending);
        assert_eq!(p.tracking_number, "TN-100");
        assert!(p.boxes.is_empty());

        let measured = h
            .packages
            .record_measurement(p.id, vec![standard_box(), standard_box()])
            .await
            .unwrap();
        assert_eq!(measured.status, PackageStatus::Arrived);
        assert_eq!(measured.computed_fee, 1250);
        assert!(measured.arrived_at.is_some());
        assert_eq!(h.notifier.titles(), ["Package arrived"]);
    }

    #[tokio::test]
    async fn re_measurement_keeps_arrived_and_replaces_fee() {
        let h = Harness::new().await;
        let p = h.arrived_package(1, "TN-101").await;
        assert_eq!(p.computed_fee, 625);

        let again = h
            .packages
            .record_measurement(p.id, vec![standard_box(), standard_box()])
            .await
            .unwrap();
        assert_eq!(again.status, PackageStatus::Arrived);
        assert_eq!(again.computed_fee, 1250);
        assert_eq!(again.boxes.len(), 2);

        let stored = h.packages.get(p.id).await.unwrap();
        let sum: i64 = stored.boxes.iter().map(|b| b.quote.fee).sum();
        assert_eq!(stored.computed_fee, sum);
    }

    #[tokio::test]
    async fn unmeasured_boxes_do_not_block_saving() {
        let h = Harness::new().await;
        let p = h.packages.forecast(forecast(1, "TN-102")).await.unwrap();
        let partial = CargoBox {
            weight_kg: None,
            ..standard_box()
        };
        let measured = h.packages.record_measurement(p.id, vec![partial]).await.unwrap();
        assert_eq!(measured.computed_fee, 0);
        assert_eq!(measured.status, PackageStatus::Arrived);
    }

    #[tokio::test]
    async fn unknown_category_falls_back() {
        let h = Harness::new().await;
        let p = h.packages.forecast(forecast(1, "TN-103")).await.unwrap();
        let odd = CargoBox {
            category_key: "GENERAL".into(),
            ..standard_box()
        };
        let measured = h.packages.record_measurement(p.id, vec![odd]).await.unwrap();
        assert!(measured.boxes[0].quote.fell_back);
        assert_eq!(measured.boxes[0].quote.billed_category, "general");
        assert_eq!(measured.boxes[0].measurement.category_key, "GENERAL");
    }

    #[tokio::test]
    async fn duplicate_tracking_number_conflicts() {
        let h = Harness::new().await;
        h.packages.forecast(forecast(1, "TN-104")).await.unwrap();
        let err = h.packages.forecast(forecast(2, "TN-104")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn invalid_forecast_is_rejected() {
        let h = Harness::new().await;
        let err = h
            .packages
            .forecast(ForecastRequest {
                quantity: -1,
                ..forecast(1, "TN-105")
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn edit_and_delete_only_while_pending() {
        let h = Harness::new().await;
        let pending = h.packages.forecast(forecast(1, "TN-106")).await.unwrap();
        let edited = h
            .packages
            .edit(
                pending.id,
                PackageEditRequest {
                    product_name: Some("Floor lamp".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(edited.product_name, "Floor lamp");

        let arrived = h.arrived_package(1, "TN-107").await;
        let err = h
            .packages
            .edit(
                arrived.id,
                PackageEditRequest {
                    quantity: Some(5),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(
            h.packages.delete(arrived.id).await.unwrap_err().kind(),
            ErrorKind::InvalidState
        );

        h.packages.delete(pending.id).await.unwrap();
        assert_eq!(
            h.packages.get(pending.id).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[tokio::test]
    async fn replaced_image_is_deleted_after_commit() {
        let h = Harness::new().await;
        h.files.put("uploads/old.jpg");
        h.files.put("uploads/new.jpg");
        let p = h
            .packages
            .forecast(ForecastRequest {
                image_path: Some("uploads/old.jpg".into()),
                ..forecast(1, "TN-108")
            })
            .await
            .unwrap();

        h.packages
            .edit(
                p.id,
                PackageEditRequest {
                    image_path: Some(Some("uploads/new.jpg".into())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(h.files.deleted(), ["uploads/old.jpg"]);

        let err = h
            .packages
            .edit(
                p.id,
                PackageEditRequest {
                    image_path: Some(Some("uploads/missing.jpg".into())),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn in_shipment_package_cannot_be_measured() {
        let h = Harness::new().await;
        let shipment = h.arrived_shipment(1, 1).await;
        let err = h
            .packages
            .record_measurement(shipment.package_ids[0], vec![standard_box()])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[tokio::test]
    async fn quote_uses_current_table() {
        let h = Harness::new().await;
        let heavy = CargoBox {
            weight_kg: Some(dec!(150)),
            ..standard_box()
        };
        let (priced, quote) = h.packages.quote(&[standard_box(), heavy], 0).unwrap();
        assert_eq!(priced.len(), 2);
        assert!(quote.overweight_fee > 0);
        assert!(h.packages.quote(&[], -1).is_err());
    }

    #[tokio::test]
    async fn mistyped_measurement_is_rejected_not_saved() {
        let h = Harness::new().await;
        let p = h.packages.forecast(forecast(1, "TN-110")).await.unwrap();
        let huge = CargoBox {
            length_cm: Some(dec!(1000000000000)),
            width_cm: Some(dec!(1000000000000)),
            height_cm: Some(dec!(1000000000000)),
            ..standard_box()
        };

        let err = h.packages.quote(&[huge.clone()], 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = h
            .packages
            .record_measurement(p.id, vec![huge])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let stored = h.packages.get(p.id).await.unwrap();
        assert_eq!(stored.status, PackageStatus::Pending);
        assert!(stored.boxes.is_empty());

        let wide = CargoBox {
            length_cm: Some(dec!(1000000000)),
            width_cm: Some(dec!(1000000000)),
            height_cm: Some(dec!(1000000000)),
            ..standard_box()
        };
        let err = h.packages.quote(&[wide.clone(), wide], 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
