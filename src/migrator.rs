use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240601_000001_create_master_tables::Migration),
            Box::new(m20240601_000002_create_quotation_tables::Migration),
            Box::new(m20240601_000003_create_production_tables::Migration),
            Box::new(m20240601_000004_create_sale_tables::Migration),
            Box::new(m20240601_000005_create_purchase_tables::Migration),
        ]
    }
}

fn id_col<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .big_integer()
        .not_null()
        .auto_increment()
        .primary_key()
        .to_owned()
}

fn money_col<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .decimal_len(14, 2)
        .not_null()
        .default(0)
        .to_owned()
}

fn qty_col<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .decimal_len(14, 3)
        .not_null()
        .default(0)
        .to_owned()
}

fn ts_col<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .timestamp_with_time_zone()
        .not_null()
        .to_owned()
}

mod m20240601_000001_create_master_tables {
    use super::{id_col, money_col, qty_col, ts_col};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000001_create_master_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Items::Table)
                        .if_not_exists()
                        .col(id_col(Items::Id))
                        .col(ColumnDef::new(Items::Code).string().not_null().unique_key())
                        .col(ColumnDef::new(Items::Name).string().not_null())
                        .col(
                            ColumnDef::new(Items::Kind)
                                .string()
                                .not_null()
                                .default("product"),
                        )
                        .col(ColumnDef::new(Items::Unit).string().null())
                        .col(money_col(Items::Price))
                        .col(money_col(Items::Cost))
                        .col(qty_col(Items::Stock))
                        .col(ColumnDef::new(Items::Size).string().null())
                        .col(ColumnDef::new(Items::Gsm).string().null())
                        .col(ColumnDef::new(Items::Color).string().null())
                        .col(
                            ColumnDef::new(Items::Status)
                                .string_len(16)
                                .not_null()
                                .default("active"),
                        )
                        .col(ts_col(Items::CreatedAt))
                        .col(ts_col(Items::UpdatedAt))
                        .col(
                            ColumnDef::new(Items::DeletedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Customers::Table)
                        .if_not_exists()
                        .col(id_col(Customers::Id))
                        .col(
                            ColumnDef::new(Customers::Code)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Customers::Name).string().not_null())
                        .col(ColumnDef::new(Customers::CompanyName).string().null())
                        .col(ColumnDef::new(Customers::Phone).string().not_null())
                        .col(ColumnDef::new(Customers::Email).string().null())
                        .col(ColumnDef::new(Customers::Address).text().null())
                        .col(money_col(Customers::CreditLimit))
                        .col(money_col(Customers::OpeningBalance))
                        .col(money_col(Customers::CurrentBalance))
                        .col(
                            ColumnDef::new(Customers::Status)
                                .string_len(16)
                                .not_null()
                                .default("active"),
                        )
                        .col(ts_col(Customers::CreatedAt))
                        .col(ts_col(Customers::UpdatedAt))
                        .col(
                            ColumnDef::new(Customers::DeletedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_customers_phone")
                        .table(Customers::Table)
                        .col(Customers::Phone)
                        .if_not_exists()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(CustomerBalanceEntries::Table)
                        .if_not_exists()
                        .col(id_col(CustomerBalanceEntries::Id))
                        .col(
                            ColumnDef::new(CustomerBalanceEntries::CustomerId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CustomerBalanceEntries::Delta)
                                .decimal_len(14, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CustomerBalanceEntries::BalanceAfter)
                                .decimal_len(14, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CustomerBalanceEntries::Reason)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CustomerBalanceEntries::ReferenceType)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(CustomerBalanceEntries::ReferenceId)
                                .big_integer()
                                .null(),
                        )
                        .col(ts_col(CustomerBalanceEntries::CreatedAt))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_customer_balance_entries_customer_id")
                                .from(
                                    CustomerBalanceEntries::Table,
                                    CustomerBalanceEntries::CustomerId,
                                )
                                .to(Customers::Table, Customers::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Suppliers::Table)
                        .if_not_exists()
                        .col(id_col(Suppliers::Id))
                        .col(
                            ColumnDef::new(Suppliers::Code)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Suppliers::Name).string().not_null())
                        .col(ColumnDef::new(Suppliers::CompanyName).string().null())
                        .col(ColumnDef::new(Suppliers::Phone).string().null())
                        .col(ColumnDef::new(Suppliers::Email).string().null())
                        .col(ColumnDef::new(Suppliers::Address).text().null())
                        .col(money_col(Suppliers::OpeningBalance))
                        .col(
                            ColumnDef::new(Suppliers::Status)
                                .string_len(16)
                                .not_null()
                                .default("active"),
                        )
                        .col(ts_col(Suppliers::CreatedAt))
                        .col(ts_col(Suppliers::UpdatedAt))
                        .col(
                            ColumnDef::new(Suppliers::DeletedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(CodeSequences::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(CodeSequences::Name)
                                .string()
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(CodeSequences::LastValue)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ts_col(CodeSequences::UpdatedAt))
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(CodeSequences::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Suppliers::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(CustomerBalanceEntries::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Customers::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Items::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Items {
        Table,
        Id,
        Code,
        Name,
        Kind,
        Unit,
        Price,
        Cost,
        Stock,
        Size,
        Gsm,
        Color,
        Status,
        CreatedAt,
        UpdatedAt,
        DeletedAt,
    }

    #[derive(DeriveIden)]
    pub enum Customers {
        Table,
        Id,
        Code,
        Name,
        CompanyName,
        Phone,
        Email,
        Address,
        CreditLimit,
        OpeningBalance,
        CurrentBalance,
        Status,
        CreatedAt,
        UpdatedAt,
        DeletedAt,
    }

    #[derive(DeriveIden)]
    enum CustomerBalanceEntries {
        Table,
        Id,
        CustomerId,
        Delta,
        BalanceAfter,
        Reason,
        ReferenceType,
        ReferenceId,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    pub enum Suppliers {
        Table,
        Id,
        Code,
        Name,
        CompanyName,
        Phone,
        Email,
        Address,
        OpeningBalance,
        Status,
        CreatedAt,
        UpdatedAt,
        DeletedAt,
    }

    #[derive(DeriveIden)]
    enum CodeSequences {
        Table,
        Name,
        LastValue,
        UpdatedAt,
    }
}

mod m20240601_000002_create_quotation_tables {
    use super::m20240601_000001_create_master_tables::{Customers, Items};
    use super::{id_col, money_col, qty_col, ts_col};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000002_create_quotation_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Quotations::Table)
                        .if_not_exists()
                        .col(id_col(Quotations::Id))
                        .col(
                            ColumnDef::new(Quotations::Code)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Quotations::CustomerId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Quotations::QuotationDate).date().not_null())
                        .col(ColumnDef::new(Quotations::ValidUntil).date().null())
                        .col(money_col(Quotations::Subtotal))
                        .col(money_col(Quotations::OtherCharges))
                        .col(money_col(Quotations::Discount))
                        .col(money_col(Quotations::Tax))
                        .col(money_col(Quotations::Total))
                        .col(money_col(Quotations::AdvanceAmount))
                        .col(
                            ColumnDef::new(Quotations::Status)
                                .string_len(32)
                                .not_null()
                                .default("pending"),
                        )
                        .col(ColumnDef::new(Quotations::Notes).text().null())
                        .col(ColumnDef::new(Quotations::Terms).text().null())
                        .col(
                            ColumnDef::new(Quotations::CreatedBy)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ts_col(Quotations::CreatedAt))
                        .col(ts_col(Quotations::UpdatedAt))
                        .col(
                            ColumnDef::new(Quotations::DeletedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_quotations_customer_id")
                                .from(Quotations::Table, Quotations::CustomerId)
                                .to(Customers::Table, Customers::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(QuotationItems::Table)
                        .if_not_exists()
                        .col(id_col(QuotationItems::Id))
                        .col(
                            ColumnDef::new(QuotationItems::QuotationId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(QuotationItems::LineNo).integer().not_null())
                        .col(ColumnDef::new(QuotationItems::ItemId).big_integer().not_null())
                        .col(ColumnDef::new(QuotationItems::Description).string().not_null())
                        .col(ColumnDef::new(QuotationItems::Size).string().null())
                        .col(ColumnDef::new(QuotationItems::Color).string().null())
                        .col(ColumnDef::new(QuotationItems::Gsm).string().null())
                        .col(ColumnDef::new(QuotationItems::PrintColor).string().null())
                        .col(ColumnDef::new(QuotationItems::PrintSide).string().null())
                        .col(qty_col(QuotationItems::Quantity))
                        .col(money_col(QuotationItems::UnitPrice))
                        .col(money_col(QuotationItems::Total))
                        .col(ts_col(QuotationItems::CreatedAt))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_quotation_items_quotation_id")
                                .from(QuotationItems::Table, QuotationItems::QuotationId)
                                .to(Quotations::Table, Quotations::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_quotation_items_item_id")
                                .from(QuotationItems::Table, QuotationItems::ItemId)
                                .to(Items::Table, Items::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(QuotationItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Quotations::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Quotations {
        Table,
        Id,
        Code,
        CustomerId,
        QuotationDate,
        ValidUntil,
        Subtotal,
        OtherCharges,
        Discount,
        Tax,
        Total,
        AdvanceAmount,
        Status,
        Notes,
        Terms,
        CreatedBy,
        CreatedAt,
        UpdatedAt,
        DeletedAt,
    }

    #[derive(DeriveIden)]
    enum QuotationItems {
        Table,
        Id,
        QuotationId,
        LineNo,
        ItemId,
        Description,
        Size,
        Color,
        Gsm,
        PrintColor,
        PrintSide,
        Quantity,
        UnitPrice,
        Total,
        CreatedAt,
    }
}

mod m20240601_000003_create_production_tables {
    use super::m20240601_000002_create_quotation_tables::Quotations;
    use super::{id_col, money_col, qty_col, ts_col};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000003_create_production_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Productions::Table)
                        .if_not_exists()
                        .col(id_col(Productions::Id))
                        .col(
                            ColumnDef::new(Productions::Code)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Productions::QuotationId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Productions::Status)
                                .string_len(32)
                                .not_null()
                                .default("pending"),
                        )
                        .col(money_col(Productions::TotalCost))
                        .col(money_col(Productions::AdvanceAmount))
                        .col(money_col(Productions::FinalCost))
                        .col(ColumnDef::new(Productions::Note).text().null())
                        .col(
                            ColumnDef::new(Productions::CreatedBy)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ts_col(Productions::CreatedAt))
                        .col(ts_col(Productions::UpdatedAt))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_productions_quotation_id")
                                .from(Productions::Table, Productions::QuotationId)
                                .to(Quotations::Table, Quotations::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            // One production per quotation is enforced by the service layer.
            manager
                .create_index(
                    Index::create()
                        .name("idx_productions_quotation_id")
                        .table(Productions::Table)
                        .col(Productions::QuotationId)
                        .if_not_exists()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ProductionItems::Table)
                        .if_not_exists()
                        .col(id_col(ProductionItems::Id))
                        .col(
                            ColumnDef::new(ProductionItems::ProductionId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductionItems::LineNo).integer().not_null())
                        .col(
                            ColumnDef::new(ProductionItems::QuotationItemId)
                                .big_integer()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ProductionItems::ProductName)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductionItems::Size).string().null())
                        .col(qty_col(ProductionItems::Quantity))
                        .col(qty_col(ProductionItems::EnvelopeWeight))
                        .col(money_col(ProductionItems::EnvelopePrice))
                        .col(qty_col(ProductionItems::LoopWeight))
                        .col(money_col(ProductionItems::LoopPrice))
                        .col(money_col(ProductionItems::PrintCost))
                        .col(money_col(ProductionItems::SewingCost))
                        .col(money_col(ProductionItems::PricePerPiece))
                        .col(money_col(ProductionItems::TotalPrice))
                        .col(qty_col(ProductionItems::WastageKg))
                        .col(qty_col(ProductionItems::WastagePiece))
                        .col(ts_col(ProductionItems::CreatedAt))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_production_items_production_id")
                                .from(ProductionItems::Table, ProductionItems::ProductionId)
                                .to(Productions::Table, Productions::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ProductionItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Productions::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Productions {
        Table,
        Id,
        Code,
        QuotationId,
        Status,
        TotalCost,
        AdvanceAmount,
        FinalCost,
        Note,
        CreatedBy,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum ProductionItems {
        Table,
        Id,
        ProductionId,
        LineNo,
        QuotationItemId,
        ProductName,
        Size,
        Quantity,
        EnvelopeWeight,
        EnvelopePrice,
        LoopWeight,
        LoopPrice,
        PrintCost,
        SewingCost,
        PricePerPiece,
        TotalPrice,
        WastageKg,
        WastagePiece,
        CreatedAt,
    }
}

mod m20240601_000004_create_sale_tables {
    use super::m20240601_000001_create_master_tables::Customers;
    use super::m20240601_000003_create_production_tables::Productions;
    use super::{id_col, money_col, qty_col, ts_col};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000004_create_sale_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Sales::Table)
                        .if_not_exists()
                        .col(id_col(Sales::Id))
                        .col(ColumnDef::new(Sales::Code).string().not_null().unique_key())
                        .col(ColumnDef::new(Sales::CustomerId).big_integer().not_null())
                        .col(ColumnDef::new(Sales::ProductionId).big_integer().null())
                        .col(
                            ColumnDef::new(Sales::SaleType)
                                .string_len(16)
                                .not_null()
                                .default("wholesale"),
                        )
                        .col(ColumnDef::new(Sales::SaleDate).date().not_null())
                        .col(money_col(Sales::Subtotal))
                        .col(money_col(Sales::Discount))
                        .col(money_col(Sales::Tax))
                        .col(money_col(Sales::OtherCosts))
                        .col(money_col(Sales::GrandTotal))
                        .col(money_col(Sales::AdvanceAdjusted))
                        .col(money_col(Sales::PaidAmount))
                        .col(money_col(Sales::DueAmount))
                        .col(
                            ColumnDef::new(Sales::Status)
                                .string_len(16)
                                .not_null()
                                .default("completed"),
                        )
                        .col(ColumnDef::new(Sales::Note).text().null())
                        .col(ColumnDef::new(Sales::CreatedBy).big_integer().not_null())
                        .col(ts_col(Sales::CreatedAt))
                        .col(ts_col(Sales::UpdatedAt))
                        .col(
                            ColumnDef::new(Sales::DeletedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_sales_customer_id")
                                .from(Sales::Table, Sales::CustomerId)
                                .to(Customers::Table, Customers::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_sales_production_id")
                                .from(Sales::Table, Sales::ProductionId)
                                .to(Productions::Table, Productions::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_sales_production_id")
                        .table(Sales::Table)
                        .col(Sales::ProductionId)
                        .if_not_exists()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(SaleItems::Table)
                        .if_not_exists()
                        .col(id_col(SaleItems::Id))
                        .col(ColumnDef::new(SaleItems::SaleId).big_integer().not_null())
                        .col(ColumnDef::new(SaleItems::LineNo).integer().not_null())
                        .col(
                            ColumnDef::new(SaleItems::ProductionItemId)
                                .big_integer()
                                .null(),
                        )
                        .col(ColumnDef::new(SaleItems::ItemName).string().not_null())
                        .col(ColumnDef::new(SaleItems::Size).string().null())
                        .col(ColumnDef::new(SaleItems::Gsm).string().null())
                        .col(ColumnDef::new(SaleItems::Color).string().null())
                        .col(qty_col(SaleItems::EnvelopeWeight))
                        .col(money_col(SaleItems::EnvelopePrice))
                        .col(qty_col(SaleItems::LoopWeight))
                        .col(money_col(SaleItems::LoopPrice))
                        .col(money_col(SaleItems::PrintCost))
                        .col(money_col(SaleItems::SewingCost))
                        .col(qty_col(SaleItems::Quantity))
                        .col(money_col(SaleItems::PricePerPiece))
                        .col(money_col(SaleItems::TotalPrice))
                        .col(ts_col(SaleItems::CreatedAt))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_sale_items_sale_id")
                                .from(SaleItems::Table, SaleItems::SaleId)
                                .to(Sales::Table, Sales::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Payments::Table)
                        .if_not_exists()
                        .col(id_col(Payments::Id))
                        .col(
                            ColumnDef::new(Payments::Code)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Payments::PayableType)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Payments::PayableId).big_integer().not_null())
                        .col(
                            ColumnDef::new(Payments::Amount)
                                .decimal_len(14, 2)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Payments::PaymentDate).date().not_null())
                        .col(ColumnDef::new(Payments::Method).string().not_null())
                        .col(ColumnDef::new(Payments::ReferenceNo).string().null())
                        .col(ColumnDef::new(Payments::Notes).text().null())
                        .col(
                            ColumnDef::new(Payments::Status)
                                .string_len(16)
                                .not_null()
                                .default("pending"),
                        )
                        .col(
                            ColumnDef::new(Payments::CollectedBy)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Payments::ApprovedBy).big_integer().null())
                        .col(
                            ColumnDef::new(Payments::ApprovedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ts_col(Payments::CreatedAt))
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_payments_payable")
                        .table(Payments::Table)
                        .col(Payments::PayableType)
                        .col(Payments::PayableId)
                        .if_not_exists()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Payments::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(SaleItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Sales::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Sales {
        Table,
        Id,
        Code,
        CustomerId,
        ProductionId,
        SaleType,
        SaleDate,
        Subtotal,
        Discount,
        Tax,
        OtherCosts,
        GrandTotal,
        AdvanceAdjusted,
        PaidAmount,
        DueAmount,
        Status,
        Note,
        CreatedBy,
        CreatedAt,
        UpdatedAt,
        DeletedAt,
    }

    #[derive(DeriveIden)]
    enum SaleItems {
        Table,
        Id,
        SaleId,
        LineNo,
        ProductionItemId,
        ItemName,
        Size,
        Gsm,
        Color,
        EnvelopeWeight,
        EnvelopePrice,
        LoopWeight,
        LoopPrice,
        PrintCost,
        SewingCost,
        Quantity,
        PricePerPiece,
        TotalPrice,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum Payments {
        Table,
        Id,
        Code,
        PayableType,
        PayableId,
        Amount,
        PaymentDate,
        Method,
        ReferenceNo,
        Notes,
        Status,
        CollectedBy,
        ApprovedBy,
        ApprovedAt,
        CreatedAt,
    }
}

mod m20240601_000005_create_purchase_tables {
    use super::m20240601_000001_create_master_tables::{Items, Suppliers};
    use super::{id_col, money_col, qty_col, ts_col};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000005_create_purchase_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Purchases::Table)
                        .if_not_exists()
                        .col(id_col(Purchases::Id))
                        .col(
                            ColumnDef::new(Purchases::Code)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Purchases::SupplierId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Purchases::PurchaseDate).date().not_null())
                        .col(ColumnDef::new(Purchases::ReferenceNo).string().null())
                        .col(qty_col(Purchases::TotalQty))
                        .col(money_col(Purchases::Subtotal))
                        .col(
                            ColumnDef::new(Purchases::DiscountType)
                                .string_len(16)
                                .not_null()
                                .default("fixed"),
                        )
                        .col(money_col(Purchases::DiscountValue))
                        .col(money_col(Purchases::Discount))
                        .col(money_col(Purchases::OtherCharges))
                        .col(money_col(Purchases::Tax))
                        .col(money_col(Purchases::Total))
                        .col(money_col(Purchases::Paid))
                        .col(money_col(Purchases::Due))
                        .col(
                            ColumnDef::new(Purchases::Status)
                                .string_len(16)
                                .not_null()
                                .default("pending"),
                        )
                        .col(ColumnDef::new(Purchases::Notes).text().null())
                        .col(ColumnDef::new(Purchases::CreatedBy).big_integer().not_null())
                        .col(ts_col(Purchases::CreatedAt))
                        .col(ts_col(Purchases::UpdatedAt))
                        .col(
                            ColumnDef::new(Purchases::DeletedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchases_supplier_id")
                                .from(Purchases::Table, Purchases::SupplierId)
                                .to(Suppliers::Table, Suppliers::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PurchaseItems::Table)
                        .if_not_exists()
                        .col(id_col(PurchaseItems::Id))
                        .col(
                            ColumnDef::new(PurchaseItems::PurchaseId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PurchaseItems::ItemId).big_integer().not_null())
                        .col(qty_col(PurchaseItems::Quantity))
                        .col(money_col(PurchaseItems::UnitPrice))
                        .col(money_col(PurchaseItems::ItemDiscount))
                        .col(money_col(PurchaseItems::ItemTax))
                        .col(money_col(PurchaseItems::Total))
                        .col(ts_col(PurchaseItems::CreatedAt))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchase_items_purchase_id")
                                .from(PurchaseItems::Table, PurchaseItems::PurchaseId)
                                .to(Purchases::Table, Purchases::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchase_items_item_id")
                                .from(PurchaseItems::Table, PurchaseItems::ItemId)
                                .to(Items::Table, Items::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PurchaseItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Purchases::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Purchases {
        Table,
        Id,
        Code,
        SupplierId,
        PurchaseDate,
        ReferenceNo,
        TotalQty,
        Subtotal,
        DiscountType,
        DiscountValue,
        Discount,
        OtherCharges,
        Tax,
        Total,
        Paid,
        Due,
        Status,
        Notes,
        CreatedBy,
        CreatedAt,
        UpdatedAt,
        DeletedAt,
    }

    #[derive(DeriveIden)]
    enum PurchaseItems {
        Table,
        Id,
        PurchaseId,
        ItemId,
        Quantity,
        UnitPrice,
        ItemDiscount,
        ItemTax,
        Total,
        CreatedAt,
    }
}
