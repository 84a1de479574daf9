use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::{
    config::{AppConfig, LedgerSettings},
    events::EventSender,
    services::{
        catalog::CatalogService, codes::CodeGenerator, customers::CustomerService,
        productions::ProductionService, purchases::PurchaseService, quotations::QuotationService,
        sales::SaleService, suppliers::SupplierService,
    },
};

/// Builds services that share one connection, one code generator and one event channel.
pub struct ServiceFactory {
    db: Arc<DatabaseConnection>,
    codes: CodeGenerator,
    ledger: LedgerSettings,
    event_sender: Option<EventSender>,
}

impl ServiceFactory {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: &AppConfig,
        event_sender: Option<EventSender>,
    ) -> Self {
        Self {
            db,
            codes: CodeGenerator::new(config.codes.clone()),
            ledger: config.ledger.clone(),
            event_sender,
        }
    }

    /// Factory with default code and ledger settings.
    pub fn with_defaults(db: Arc<DatabaseConnection>, event_sender: Option<EventSender>) -> Self {
        Self {
            db,
            codes: CodeGenerator::default(),
            ledger: LedgerSettings::default(),
            event_sender,
        }
    }

    pub fn with_ledger_settings(mut self, ledger: LedgerSettings) -> Self {
        self.ledger = ledger;
        self
    }

    pub fn catalog_service(&self) -> CatalogService {
        CatalogService::new(self.db.clone(), self.codes.clone())
    }

    pub fn customer_service(&self) -> CustomerService {
        CustomerService::new(self.db.clone(), self.codes.clone(), self.event_sender.clone())
    }

    pub fn supplier_service(&self) -> SupplierService {
        SupplierService::new(self.db.clone(), self.codes.clone())
    }

    pub fn quotation_service(&self) -> QuotationService {
        QuotationService::new(
            self.db.clone(),
            self.codes.clone(),
            self.ledger.clone(),
            self.event_sender.clone(),
        )
    }

    pub fn production_service(&self) -> ProductionService {
        ProductionService::new(
            self.db.clone(),
            self.codes.clone(),
            self.ledger.clone(),
            self.event_sender.clone(),
        )
    }

    pub fn sale_service(&self) -> SaleService {
        SaleService::new(
            self.db.clone(),
            self.codes.clone(),
            self.ledger.clone(),
            self.event_sender.clone(),
        )
    }

    pub fn purchase_service(&self) -> PurchaseService {
        PurchaseService::new(self.db.clone(), self.codes.clone(), self.event_sender.clone())
    }

    pub fn db(&self) -> &Arc<DatabaseConnection> {
        &self.db
    }
}

/// Every service, built once.
#[derive(Clone)]
pub struct ServiceContainer {
    pub catalog: Arc<CatalogService>,
    pub customers: Arc<CustomerService>,
    pub suppliers: Arc<SupplierService>,
    pub quotations: Arc<QuotationService>,
    pub productions: Arc<ProductionService>,
    pub sales: Arc<SaleService>,
    pub purchases: Arc<PurchaseService>,
}

impl ServiceContainer {
    pub fn new(factory: &ServiceFactory) -> Self {
        Self {
            catalog: Arc::new(factory.catalog_service()),
            customers: Arc::new(factory.customer_service()),
            suppliers: Arc::new(factory.supplier_service()),
            quotations: Arc::new(factory.quotation_service()),
            productions: Arc::new(factory.production_service()),
            sales: Arc::new(factory.sale_service()),
            purchases: Arc::new(factory.purchase_service()),
        }
    }
}
