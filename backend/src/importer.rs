//! Routes decoded documents into the destination tables, one mapping at a
//! time, one document at a time.
//!
//! Every routine is idempotent: inserts go through `INSERT OR IGNORE`
//! against the destination's natural key, so reimporting a mapping after an
//! operator fixed it is always safe. `imported` counts rows that actually
//! landed; duplicate-skipped rows count as nothing.
//!
//! Per-document failures are caught individually: they increment `failed`,
//! push a human-readable entry onto the error list and leave an audit log
//! row with the record's original identifier and the offending payload.
//! They never stop the rest of the mapping.
//!
//! Required-but-missing business keys are synthesized deterministically from
//! the document's original identifier, never randomly — a random key would
//! break reimport idempotence.

use crate::bson::{BsonValue, Document};
use crate::db;
use crate::transformer::map_document;
use common::model::import::ImportResult;
use common::model::log_entry::LogLevel;
use rusqlite::{params, Connection};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default)]
pub struct ImportOptions {
    pub tenant_id: Option<i64>,
    pub store_id: Option<i64>,
}

/// Dispatches one mapping's documents to the routine for `target_entity`.
/// Unknown destinations fall through to the generic importer, which records
/// the mapped payloads in the log stream without writing business rows —
/// the dispatcher never errors on an unrecognized target.
pub fn import_to_database(
    conn: &Connection,
    target_entity: &str,
    docs: &[Document],
    field_mappings: &HashMap<String, String>,
    job_id: i64,
    options: &ImportOptions,
) -> ImportResult {
    match target_entity {
        "customers" => import_customers(conn, docs, field_mappings, job_id, options),
        "products" => import_products(conn, docs, field_mappings, job_id, options),
        "pos_sales" => import_sales(conn, docs, field_mappings, job_id, options),
        "retail_sellers" => import_sellers(conn, docs, field_mappings, job_id, options),
        "retail_stores" => import_stores(conn, docs, field_mappings, job_id, options),
        "service_orders" => import_service_orders(conn, docs, field_mappings, job_id, options),
        "fin_transactions" | "fin_accounts_payable" | "fin_accounts_receivable" => {
            import_financial_entries(conn, docs, job_id)
        }
        other => import_generic(conn, docs, other, field_mappings, job_id),
    }
}

/// Last `n` characters of a source identifier, char-boundary safe.
fn id_tail(id: &str, n: usize) -> &str {
    match id.char_indices().rev().nth(n.saturating_sub(1)) {
        Some((idx, _)) => &id[idx..],
        None => id,
    }
}

/// Deterministic short business code: prefix + last 6 chars of the source
/// identifier, uppercased.
fn generate_code(prefix: &str, id: Option<&str>) -> String {
    let id = match id {
        Some(id) if !id.is_empty() => id,
        _ => "legacy",
    };
    format!("{}{}", prefix, id_tail(id, 6)).to_uppercase()
}

/// Truthy text lookup on a mapped payload: `None` for missing, null and
/// empty-string values, numbers rendered as text.
fn mapped_text(mapped: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    match mapped.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// Monetary text with the `"0"` default the destination columns expect.
fn mapped_money(mapped: &serde_json::Map<String, Value>, key: &str) -> String {
    mapped_text(mapped, key).unwrap_or_else(|| "0".to_string())
}

fn join_address(mapped: &serde_json::Map<String, Value>, parts: &[&str]) -> Option<String> {
    let joined: Vec<String> = parts.iter().filter_map(|p| mapped_text(mapped, p)).collect();
    if joined.is_empty() {
        None
    } else {
        Some(joined.join(", "))
    }
}

fn record_failure(
    conn: &Connection,
    result: &mut ImportResult,
    job_id: i64,
    source_id: &str,
    error: &str,
    payload: Option<Value>,
) {
    result.failed += 1;
    result.errors.push(format!("Doc {}: {}", source_id, error));
    db::append_log(
        conn,
        job_id,
        None,
        LogLevel::Error,
        error,
        Some(source_id),
        payload.as_ref(),
    );
}

fn import_customers(
    conn: &Connection,
    docs: &[Document],
    field_mappings: &HashMap<String, String>,
    job_id: i64,
    options: &ImportOptions,
) -> ImportResult {
    let mut result = ImportResult::default();

    for doc in docs {
        let source_id = doc.source_id().unwrap_or_default();
        let mapped = map_document(doc, field_mappings);
        let code = mapped_text(&mapped, "code")
            .unwrap_or_else(|| generate_code("CLI", Some(&source_id)));
        let name = mapped_text(&mapped, "name")
            .or_else(|| mapped_text(&mapped, "legal_name"))
            .unwrap_or_else(|| "Cliente Importado".to_string());

        let insert = conn.execute(
            "INSERT OR IGNORE INTO customers (tenant_id, code, name, tax_id, email, phone, address, city, state, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                options.tenant_id,
                code,
                name,
                mapped_text(&mapped, "cpf_cnpj").or_else(|| mapped_text(&mapped, "tax_id")),
                mapped_text(&mapped, "email"),
                mapped_text(&mapped, "phone").or_else(|| mapped_text(&mapped, "mobile")),
                join_address(&mapped, &["street", "number", "complement", "neighborhood"]),
                mapped_text(&mapped, "city"),
                mapped_text(&mapped, "state"),
                mapped_text(&mapped, "notes"),
            ],
        );

        match insert {
            Ok(changed) => result.imported += changed as i64,
            Err(e) => record_failure(
                conn,
                &mut result,
                job_id,
                &source_id,
                &e.to_string(),
                Some(Value::Object(mapped)),
            ),
        }
    }

    result
}

fn import_products(
    conn: &Connection,
    docs: &[Document],
    field_mappings: &HashMap<String, String>,
    job_id: i64,
    options: &ImportOptions,
) -> ImportResult {
    let mut result = ImportResult::default();

    for doc in docs {
        let source_id = doc.source_id().unwrap_or_default();
        let mapped = map_document(doc, field_mappings);
        let code = mapped_text(&mapped, "code")
            .or_else(|| mapped_text(&mapped, "sku"))
            .unwrap_or_else(|| generate_code("PRD", Some(&source_id)));
        let name =
            mapped_text(&mapped, "name").unwrap_or_else(|| "Produto Importado".to_string());

        let insert = conn.execute(
            "INSERT OR IGNORE INTO products (tenant_id, code, name, description, category, unit, sale_price, cost_price, ncm, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 'active')",
            params![
                options.tenant_id,
                code,
                name,
                mapped_text(&mapped, "description"),
                mapped_text(&mapped, "category"),
                mapped_text(&mapped, "unit").unwrap_or_else(|| "UN".to_string()),
                mapped_money(&mapped, "sell_price"),
                mapped_money(&mapped, "cost_price"),
                mapped_text(&mapped, "ncm"),
            ],
        );

        match insert {
            Ok(changed) => result.imported += changed as i64,
            Err(e) => record_failure(
                conn,
                &mut result,
                job_id,
                &source_id,
                &e.to_string(),
                Some(Value::Object(mapped)),
            ),
        }
    }

    result
}

/// Sale statuses come in as free text from the legacy system; collapse them
/// onto the three states the destination understands.
fn normalize_sale_status(raw: &str) -> &'static str {
    let lowered = raw.to_lowercase();
    if lowered.contains("cancelad") {
        "cancelled"
    } else if lowered.contains("pendent") || lowered.contains("aberto") {
        "pending"
    } else {
        "completed"
    }
}

fn import_sales(
    conn: &Connection,
    docs: &[Document],
    field_mappings: &HashMap<String, String>,
    job_id: i64,
    options: &ImportOptions,
) -> ImportResult {
    let mut result = ImportResult::default();

    for doc in docs {
        let source_id = doc.source_id().unwrap_or_default();
        let mapped = map_document(doc, field_mappings);
        let status = normalize_sale_status(&mapped_text(&mapped, "status").unwrap_or_default());
        let sale_number = mapped_text(&mapped, "sale_number")
            .unwrap_or_else(|| format!("LEG-{}", generate_code("", Some(&source_id))));
        let total = mapped_money(&mapped, "total_amount");

        let insert = conn.execute(
            "INSERT OR IGNORE INTO pos_sales (tenant_id, store_id, sale_number, subtotal, total_amount, discount_amount, status, payment_method, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                options.tenant_id,
                options.store_id.unwrap_or(1),
                sale_number,
                total,
                total,
                mapped_money(&mapped, "discount_amount"),
                status,
                mapped_text(&mapped, "payment_method").unwrap_or_else(|| "dinheiro".to_string()),
                mapped_text(&mapped, "notes"),
            ],
        );

        match insert {
            Ok(changed) => result.imported += changed as i64,
            Err(e) => record_failure(
                conn,
                &mut result,
                job_id,
                &source_id,
                &e.to_string(),
                Some(Value::Object(mapped)),
            ),
        }
    }

    result
}

fn import_sellers(
    conn: &Connection,
    docs: &[Document],
    field_mappings: &HashMap<String, String>,
    job_id: i64,
    options: &ImportOptions,
) -> ImportResult {
    let mut result = ImportResult::default();

    for doc in docs {
        let source_id = doc.source_id().unwrap_or_default();
        let mapped = map_document(doc, field_mappings);
        let name =
            mapped_text(&mapped, "name").unwrap_or_else(|| "Vendedor Importado".to_string());
        let code = mapped_text(&mapped, "code")
            .unwrap_or_else(|| generate_code("VND", Some(&source_id)));

        let insert = conn.execute(
            "INSERT OR IGNORE INTO retail_sellers (tenant_id, code, name, email, phone, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5, 1)",
            params![
                options.tenant_id,
                code,
                name,
                mapped_text(&mapped, "email"),
                mapped_text(&mapped, "phone"),
            ],
        );

        match insert {
            Ok(changed) => result.imported += changed as i64,
            Err(e) => record_failure(
                conn,
                &mut result,
                job_id,
                &source_id,
                &e.to_string(),
                Some(Value::Object(mapped)),
            ),
        }
    }

    result
}

fn import_stores(
    conn: &Connection,
    docs: &[Document],
    field_mappings: &HashMap<String, String>,
    job_id: i64,
    options: &ImportOptions,
) -> ImportResult {
    let mut result = ImportResult::default();

    for doc in docs {
        let source_id = doc.source_id().unwrap_or_default();
        let mapped = map_document(doc, field_mappings);
        let name = mapped_text(&mapped, "name").unwrap_or_else(|| "Loja Importada".to_string());
        let code = mapped_text(&mapped, "code")
            .unwrap_or_else(|| generate_code("LJ", Some(&source_id)));

        let insert = conn.execute(
            "INSERT OR IGNORE INTO retail_stores (tenant_id, code, name, legal_name, cnpj, address, city, state, zip_code, email, phone, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 'active')",
            params![
                options.tenant_id,
                code,
                name,
                mapped_text(&mapped, "legal_name"),
                mapped_text(&mapped, "cnpj"),
                join_address(&mapped, &["street", "number", "complement"]),
                mapped_text(&mapped, "city"),
                mapped_text(&mapped, "state"),
                mapped_text(&mapped, "zip_code"),
                mapped_text(&mapped, "email"),
                mapped_text(&mapped, "phone"),
            ],
        );

        match insert {
            Ok(changed) => result.imported += changed as i64,
            Err(e) => record_failure(
                conn,
                &mut result,
                job_id,
                &source_id,
                &e.to_string(),
                Some(Value::Object(mapped)),
            ),
        }
    }

    result
}

fn import_service_orders(
    conn: &Connection,
    docs: &[Document],
    field_mappings: &HashMap<String, String>,
    job_id: i64,
    options: &ImportOptions,
) -> ImportResult {
    let mut result = ImportResult::default();

    for doc in docs {
        let source_id = doc.source_id().unwrap_or_default();
        let mapped = map_document(doc, field_mappings);
        let order_number = mapped_text(&mapped, "order_number")
            .unwrap_or_else(|| format!("OS-LEG-{}", generate_code("", Some(&source_id))));
        let customer_name =
            mapped_text(&mapped, "customer_name").unwrap_or_else(|| "Cliente".to_string());

        let insert = conn.execute(
            "INSERT OR IGNORE INTO service_orders (tenant_id, store_id, order_number, customer_name, imei, brand, model, issue_description, service_type, status, labor_cost, parts_cost, total_cost)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, '0', '0', '0')",
            params![
                options.tenant_id,
                options.store_id.unwrap_or(1),
                order_number,
                customer_name,
                mapped_text(&mapped, "imei").unwrap_or_else(|| "N/A".to_string()),
                mapped_text(&mapped, "brand").unwrap_or_else(|| "N/A".to_string()),
                mapped_text(&mapped, "model").unwrap_or_else(|| "N/A".to_string()),
                mapped_text(&mapped, "description")
                    .unwrap_or_else(|| "Importado do sistema legado".to_string()),
                mapped_text(&mapped, "service_type").unwrap_or_else(|| "repair".to_string()),
                mapped_text(&mapped, "status").unwrap_or_else(|| "open".to_string()),
            ],
        );

        match insert {
            Ok(changed) => result.imported += changed as i64,
            Err(e) => record_failure(
                conn,
                &mut result,
                job_id,
                &source_id,
                &e.to_string(),
                Some(Value::Object(mapped)),
            ),
        }
    }

    result
}

fn doc_f64(doc: &Document, key: &str) -> f64 {
    doc.get(key).and_then(BsonValue::as_f64).unwrap_or(0.0)
}

fn doc_bool(doc: &Document, key: &str) -> bool {
    doc.get(key).and_then(BsonValue::as_bool).unwrap_or(false)
}

fn doc_text(doc: &Document, key: &str) -> Option<String> {
    match doc.get(key) {
        Some(BsonValue::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Calendar-date part (YYYY-MM-DD) of a decoded datetime or date string.
fn doc_date(doc: &Document, key: &str) -> Option<String> {
    let text = match doc.get(key) {
        Some(BsonValue::DateTime(s)) => s.as_str(),
        Some(BsonValue::String(s)) => s.as_str(),
        _ => return None,
    };
    let bytes = text.as_bytes();
    if bytes.len() >= 10 && bytes[4] == b'-' && bytes[7] == b'-' {
        text.get(..10).map(|s| s.to_string())
    } else {
        None
    }
}

fn money_text(amount: f64) -> String {
    if amount.fract() == 0.0 && amount.abs() < 1e15 {
        format!("{}", amount as i64)
    } else {
        format!("{}", amount)
    }
}

/// Ledger entries bifurcate: an inflow (`Entrada > 0`) becomes a receivable,
/// an outflow (`Saida > 0`) becomes a payable. Entries with neither amount
/// populated are counted as failed with an explanatory message — never
/// silently dropped.
fn import_financial_entries(conn: &Connection, docs: &[Document], job_id: i64) -> ImportResult {
    let mut result = ImportResult::default();

    for doc in docs {
        let source_id = doc.source_id().unwrap_or_default();
        let entrada = doc_f64(doc, "Entrada");
        let saida = doc_f64(doc, "Saida");
        let pago = doc_bool(doc, "Pago");

        let doc_number = doc_text(doc, "NumeroDocumento")
            .unwrap_or_else(|| format!("LEG-{}", id_tail(&source_id, 8)));
        let description =
            doc_text(doc, "Descricao").unwrap_or_else(|| "Lançamento importado".to_string());
        let today = db::now_iso()[..10].to_string();
        let due_date = doc_date(doc, "DataVencimento").unwrap_or_else(|| today.clone());
        let issue_date = doc_date(doc, "DataFluxo").unwrap_or_else(|| today.clone());
        let payment_date = match doc.get("DataPagamento") {
            Some(BsonValue::DateTime(s)) if !s.starts_with("timestamp:") => Some(s.clone()),
            _ => None,
        };
        let valor_pago = doc_f64(doc, "ValorPago");
        let desconto = money_text(doc_f64(doc, "Desconto"));
        let juro = money_text(doc_f64(doc, "Juro"));
        let multa = money_text(doc_f64(doc, "Multa"));
        let notes = doc_text(doc, "Observacoes");

        let insert = if entrada > 0.0 {
            let settled = if valor_pago > 0.0 { valor_pago } else { entrada };
            conn.execute(
                "INSERT OR IGNORE INTO fin_accounts_receivable (document_number, customer_name, description, issue_date, due_date, original_amount, discount_amount, interest_amount, fine_amount, received_amount, remaining_amount, status, received_at, notes)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    doc_number,
                    doc_text(doc, "Cliente").unwrap_or_else(|| "Cliente".to_string()),
                    description,
                    issue_date,
                    due_date,
                    money_text(entrada),
                    desconto,
                    juro,
                    multa,
                    if pago { money_text(settled) } else { "0".to_string() },
                    if pago { "0".to_string() } else { money_text(entrada) },
                    if pago { "received" } else { "pending" },
                    payment_date,
                    notes,
                ],
            )
        } else if saida > 0.0 {
            let settled = if valor_pago > 0.0 { valor_pago } else { saida };
            conn.execute(
                "INSERT OR IGNORE INTO fin_accounts_payable (document_number, supplier_name, description, issue_date, due_date, original_amount, discount_amount, interest_amount, fine_amount, paid_amount, remaining_amount, status, paid_at, notes)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    doc_number,
                    doc_text(doc, "Cliente").unwrap_or_else(|| "Fornecedor".to_string()),
                    description,
                    issue_date,
                    due_date,
                    money_text(saida),
                    desconto,
                    juro,
                    multa,
                    if pago { money_text(settled) } else { "0".to_string() },
                    if pago { "0".to_string() } else { money_text(saida) },
                    if pago { "paid" } else { "pending" },
                    payment_date,
                    notes,
                ],
            )
        } else {
            result.failed += 1;
            result
                .errors
                .push(format!("Doc {}: Sem valor de entrada ou saída", source_id));
            continue;
        };

        match insert {
            Ok(changed) => result.imported += changed as i64,
            Err(e) => record_failure(
                conn,
                &mut result,
                job_id,
                &source_id,
                &e.to_string(),
                Some(doc.to_json()),
            ),
        }
    }

    result
}

/// Fallback for destinations without a dedicated routine: the mapped payload
/// is recorded in the log stream for visibility, no business rows are
/// written.
fn import_generic(
    conn: &Connection,
    docs: &[Document],
    target_entity: &str,
    field_mappings: &HashMap<String, String>,
    job_id: i64,
) -> ImportResult {
    let mut result = ImportResult::default();

    for doc in docs {
        let mapped = map_document(doc, field_mappings);
        db::append_log(
            conn,
            job_id,
            None,
            LogLevel::Info,
            &format!("Registro mapeado para {}", target_entity),
            doc.source_id().as_deref(),
            Some(&Value::Object(mapped)),
        );
        result.imported += 1;
    }

    result
}
