//! Package domain entity

use chrono::{DateTime, Utc};

use crate::domain::pricing::PricedBox;
use crate::shared::errors::{DomainError, UnavailableReason};

/// Package lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageStatus {
    /// Forecast by the customer, not yet received
    Pending,
    /// Received and measured at the warehouse
    Arrived,
    /// Claimed by an open shipment
    InShipment,
    /// Shipment finalized
    Completed,
}

impl PackageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Arrived => "Arrived",
            Self::InShipment => "InShipment",
            Self::Completed => "Completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(Self::Pending),
            "Arrived" => Some(Self::Arrived),
            "InShipment" => Some(Self::InShipment),
            "Completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

impl std::fmt::Display for PackageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Customer forecast for a package that has not been stored yet.
#[derive(Debug, Clone)]
pub struct NewPackage {
    pub owner_user_id: i32,
    pub tracking_number: String,
    pub product_name: String,
    pub quantity: i32,
    pub image_path: Option<String>,
}

/// Fields a customer may change while the package is still pending.
#[derive(Debug, Clone, Default)]
pub struct PackageEdit {
    pub tracking_number: Option<String>,
    pub product_name: Option<String>,
    pub quantity: Option<i32>,
    /// `Some(None)` clears the image reference
    pub image_path: Option<Option<String>>,
}

#[derive(Debug, Clone)]
pub struct Package {
    pub id: i32,
    pub owner_user_id: i32,
    /// Unique across all stored packages
    pub tracking_number: String,
    pub product_name: String,
    pub quantity: i32,
    /// Opaque file store reference
    pub image_path: Option<String>,
    /// Measured boxes with the quotes they were priced at; empty until measured
    pub boxes: Vec<PricedBox>,
    /// Always the sum of `boxes[*].quote.fee`
    pub computed_fee: i64,
    pub status: PackageStatus,
    /// Set iff `status == InShipment`
    pub shipment_id: Option<i32>,
    /// Bumped on every measurement or edit
    pub revision: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub arrived_at: Option<DateTime<Utc>>,
}

impl Package {
    fn invalid(&self, operation: &'static str) -> DomainError {
        DomainError::InvalidState {
            entity: "Package",
            id: self.id,
            status: self.status.to_string(),
            operation,
        }
    }

    /// Measurements are accepted until the package is claimed or finalized.
    pub fn ensure_measurable(&self) -> Result<(), DomainError> {
        match self.status {
            PackageStatus::Pending | PackageStatus::Arrived if self.shipment_id.is_none() => Ok(()),
            _ => Err(self.invalid("measure")),
        }
    }

    /// Customer edits and deletion are only legal before arrival.
    pub fn ensure_pending(&self, operation: &'static str) -> Result<(), DomainError> {
        if self.status == PackageStatus::Pending {
            Ok(())
        } else {
            Err(self.invalid(operation))
        }
    }

    /// Replace the measured boxes, recompute the fee, and mark as arrived.
    pub fn apply_measurement(&mut self, boxes: Vec<PricedBox>) -> Result<(), DomainError> {
        self.ensure_measurable()?;
        let computed_fee = boxes
            .iter()
            .try_fold(0i64, |acc, b| acc.checked_add(b.quote.fee))
            .ok_or_else(|| DomainError::Validation("package fee is out of range".into()))?;
        let now = Utc::now();
        self.computed_fee = computed_fee;
        self.boxes = boxes;
        if self.status == PackageStatus::Pending {
            self.status = PackageStatus::Arrived;
            self.arrived_at = Some(now);
        }
        self.revision += 1;
        self.updated_at = now;
        Ok(())
    }

    /// Apply a customer edit; returns the image path that was replaced, if any.
    pub fn apply_edit(&mut self, edit: PackageEdit) -> Result<Option<String>, DomainError> {
        self.ensure_pending("edit")?;
        let mut replaced_image = None;
        if let Some(tracking_number) = edit.tracking_number {
            self.tracking_number = tracking_number;
        }
        if let Some(product_name) = edit.product_name {
            self.product_name = product_name;
        }
        if let Some(quantity) = edit.quantity {
            if quantity <= 0 {
                return Err(DomainError::Validation("quantity must be positive".into()));
            }
            self.quantity = quantity;
        }
        if let Some(image_path) = edit.image_path {
            if image_path != self.image_path {
                replaced_image = std::mem::replace(&mut self.image_path, image_path);
            }
        }
        self.revision += 1;
        self.updated_at = Utc::now();
        Ok(replaced_image)
    }

    /// Why this package cannot join a shipment for `owner`, if it cannot.
    pub fn unavailable_reason(&self, owner_user_id: i32) -> Option<UnavailableReason> {
        if self.owner_user_id != owner_user_id {
            Some(UnavailableReason::NotOwned)
        } else if let Some(shipment_id) = self.shipment_id {
            Some(UnavailableReason::AlreadyInShipment(shipment_id))
        } else if self.status != PackageStatus::Arrived {
            Some(UnavailableReason::NotArrived(self.status.to_string()))
        } else {
            None
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────
