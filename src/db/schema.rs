//! DDL of the invoice analytics database the agent queries.
//!
//! The server never executes this: the tables are owned and migrated by the
//! dashboard API. The text is only handed to the model when
//! `SCHEMA_IN_PROMPT` is enabled.

/// Tables described by [`INVOICE_DDL`], in dependency order.
pub const SCHEMA_TABLES: [&str; 8] = [
    "User", "Vendor", "Customer", "Payment", "Invoice", "Category", "Document", "LineItem",
];

/// Postgres schema with:
/// - quoted, mixed-case identifiers (`"Invoice"."invoiceTotal"`)
/// - `Invoice` referencing `Payment` (1:1), `Vendor` and `Customer`
/// - `Document` attached 1:1 to an `Invoice`
/// - `LineItem` cascading with its `Invoice`, optionally tagged with a `Category`
pub const INVOICE_DDL: &str = r#"
CREATE TABLE "User" (
    "id" SERIAL PRIMARY KEY,
    "name" VARCHAR(255) NOT NULL,
    "email" VARCHAR(255) NOT NULL UNIQUE,
    "createdAt" TIMESTAMP NOT NULL DEFAULT now()
);

CREATE TABLE "Vendor" (
    "id" VARCHAR(255) PRIMARY KEY,
    "name" VARCHAR(255) NOT NULL,
    "partyNumber" VARCHAR(64) UNIQUE,
    "address" TEXT,
    "taxId" VARCHAR(64),
    "createdAt" TIMESTAMP NOT NULL DEFAULT now(),
    "updatedAt" TIMESTAMP NOT NULL,
    "totalSpend" DECIMAL(30, 2)
);

CREATE TABLE "Customer" (
    "id" VARCHAR(255) PRIMARY KEY,
    "name" VARCHAR(255) NOT NULL,
    "address" TEXT,
    "createdAt" TIMESTAMP NOT NULL DEFAULT now(),
    "updatedAt" TIMESTAMP NOT NULL
);

CREATE TABLE "Payment" (
    "id" VARCHAR(255) PRIMARY KEY,
    "dueDate" TIMESTAMP,
    "paymentTerms" TEXT,
    "bankAccount" TEXT,
    "bic" TEXT,
    "accountName" TEXT,
    "netDays" INT DEFAULT 0,
    "discountPercent" DECIMAL(5, 2),
    "discountDays" INT,
    "discountedTotal" DECIMAL(30, 2),
    "createdAt" TIMESTAMP NOT NULL DEFAULT now(),
    "updatedAt" TIMESTAMP NOT NULL
);

CREATE TABLE "Invoice" (
    "id" VARCHAR(255) PRIMARY KEY,
    "invoiceNumber" TEXT,
    "invoiceDate" TIMESTAMP,
    "invoiceTotal" DECIMAL(30, 2),
    "isCreditNote" BOOLEAN NOT NULL DEFAULT false,
    "createdAt" TIMESTAMP NOT NULL DEFAULT now(),
    "updatedAt" TIMESTAMP NOT NULL,
    "paymentId" VARCHAR(255) UNIQUE,
    "vendorId" VARCHAR(255),
    "customerId" VARCHAR(255),
    FOREIGN KEY ("paymentId") REFERENCES "Payment"("id"),
    FOREIGN KEY ("vendorId") REFERENCES "Vendor"("id") ON DELETE SET NULL,
    FOREIGN KEY ("customerId") REFERENCES "Customer"("id")
);

CREATE TABLE "Category" (
    "id" VARCHAR(255) PRIMARY KEY,
    "code" VARCHAR(255) UNIQUE,
    "name" VARCHAR(255) NOT NULL,
    "createdAt" TIMESTAMP NOT NULL DEFAULT now(),
    "updatedAt" TIMESTAMP NOT NULL
);

CREATE TABLE "Document" (
    "id" VARCHAR(255) PRIMARY KEY,
    "fileName" TEXT NOT NULL,
    "filePath" TEXT NOT NULL,
    "fileSizeBytes" INT,
    "fileType" TEXT,
    "status" TEXT,
    "createdAt" TIMESTAMP NOT NULL DEFAULT now(),
    "updatedAt" TIMESTAMP NOT NULL,
    "organizationId" TEXT,
    "departmentId" TEXT,
    "metadata" JSONB,
    "extractedData" JSONB,
    "validated" BOOLEAN NOT NULL DEFAULT false,
    "invoiceId" VARCHAR(255) UNIQUE,
    FOREIGN KEY ("invoiceId") REFERENCES "Invoice"("id")
);

CREATE TABLE "LineItem" (
    "id" VARCHAR(255) PRIMARY KEY,
    "invoiceId" VARCHAR(255) NOT NULL,
    "srNo" INT,
    "description" TEXT,
    "quantity" DECIMAL(20, 4),
    "unitPrice" DECIMAL(30, 2),
    "totalPrice" DECIMAL(30, 2),
    "sachkonto" TEXT,
    "buschluessel" TEXT,
    "categoryId" VARCHAR(255),
    "createdAt" TIMESTAMP NOT NULL DEFAULT now(),
    "updatedAt" TIMESTAMP NOT NULL,
    FOREIGN KEY ("invoiceId") REFERENCES "Invoice"("id") ON DELETE CASCADE,
    FOREIGN KEY ("categoryId") REFERENCES "Category"("id") ON DELETE SET NULL
);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ddl_declares_every_listed_table_once() {
        for table in SCHEMA_TABLES {
            let stmt = format!("CREATE TABLE \"{table}\" (");
            assert_eq!(INVOICE_DDL.matches(&stmt).count(), 1, "{table}");
        }
        assert_eq!(INVOICE_DDL.matches("CREATE TABLE").count(), SCHEMA_TABLES.len());
    }

    #[test]
    fn foreign_keys_point_at_declared_tables() {
        for line in INVOICE_DDL.lines().filter(|l| l.contains("REFERENCES")) {
            let target = line
                .split("REFERENCES \"")
                .nth(1)
                .and_then(|rest| rest.split('"').next())
                .unwrap();
            assert!(SCHEMA_TABLES.contains(&target), "{line}");
        }
    }
}
