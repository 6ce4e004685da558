//! Known source collections and their default destination mappings.
//!
//! The registry is configuration, not logic: a table mapping a source
//! collection name to the destination entity and the field renames that
//! seed the job's default `MigrationMapping` rows after analysis. It is
//! injected at construction so tests can run against a synthetic table, and
//! extending it never touches the decoder or the importer. Collections
//! without an entry simply get no default mapping — the operator wires them
//! up by hand or they fall through to the generic importer.

use std::collections::HashMap;

/// One registry row: where documents of `source` go and how their fields
/// are renamed on the way.
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub source: &'static str,
    pub target: &'static str,
    pub fields: &'static [(&'static str, &'static str)],
}

impl RegistryEntry {
    pub fn field_mappings(&self) -> HashMap<String, String> {
        self.fields
            .iter()
            .map(|(src, dst)| (src.to_string(), dst.to_string()))
            .collect()
    }
}

pub struct MappingRegistry {
    entries: Vec<RegistryEntry>,
}

impl MappingRegistry {
    pub fn new(entries: Vec<RegistryEntry>) -> Self {
        MappingRegistry { entries }
    }

    /// The registry for the known vendor backup layout.
    pub fn builtin() -> Self {
        MappingRegistry::new(BUILTIN_MAPPINGS.to_vec())
    }

    pub fn lookup(&self, source: &str) -> Option<&RegistryEntry> {
        self.entries.iter().find(|e| e.source == source)
    }
}

/// Field renames for the collections the vendor format is known to ship.
/// Source field names are the vendor's own (Portuguese) spellings.
const BUILTIN_MAPPINGS: &[RegistryEntry] = &[
    RegistryEntry {
        source: "DtoPessoa",
        target: "customers",
        fields: &[
            ("_id", "legacy_id"),
            ("NomeFantasia", "name"),
            ("RazaoSocial", "legal_name"),
            ("CNPJ_CPF", "cpf_cnpj"),
            ("IE", "state_registration"),
            ("IM", "municipal_registration"),
            ("Email", "email"),
            ("Telefone", "phone"),
            ("Celular", "mobile"),
            ("Logradouro", "street"),
            ("Numero", "number"),
            ("Complemento", "complement"),
            ("Bairro", "neighborhood"),
            ("Cidade", "city"),
            ("UF", "state"),
            ("CEP", "zip_code"),
            ("PessoaFisica", "is_individual"),
            ("Observacoes", "notes"),
        ],
    },
    RegistryEntry {
        source: "DtoProduto",
        target: "products",
        fields: &[
            ("_id", "legacy_id"),
            ("Nome", "name"),
            ("Codigo", "sku"),
            ("CodigoNFe", "code"),
            ("Descricao", "description"),
            ("PrecoVenda", "sell_price"),
            ("PrecoCusto", "cost_price"),
            ("NCM_NFe", "ncm"),
            ("CEST_NFe", "cest"),
            ("Categoria", "category"),
            ("Marca", "brand"),
            ("Unidade", "unit"),
            ("Ativo", "is_active"),
            ("ControlaEstoque", "track_inventory"),
        ],
    },
    RegistryEntry {
        source: "DtoVenda",
        target: "pos_sales",
        fields: &[
            ("_id", "legacy_id"),
            ("Codigo", "sale_number"),
            ("Data", "created_at"),
            ("ValorTotal", "total_amount"),
            ("ValorDesconto", "discount_amount"),
            ("Status", "status"),
            ("FormaPagamento", "payment_method"),
            ("Observacoes", "notes"),
        ],
    },
    RegistryEntry {
        source: "DtoLancamento",
        target: "fin_transactions",
        fields: &[
            ("_id", "legacy_id"),
            ("Descricao", "description"),
            ("Entrada", "entrada"),
            ("Saida", "saida"),
            ("DataVencimento", "due_date"),
            ("DataPagamento", "payment_date"),
            ("Pago", "is_paid"),
            ("ValorPago", "paid_amount"),
            ("Cliente", "customer_name"),
            ("FormaPagamento", "payment_method"),
            ("PlanoDeConta", "category"),
            ("Observacoes", "notes"),
        ],
    },
    RegistryEntry {
        source: "DtoColaborador",
        target: "retail_sellers",
        fields: &[
            ("_id", "legacy_id"),
            ("Nome", "name"),
            ("Codigo", "code"),
            ("CPF", "cpf"),
            ("Email", "email"),
            ("Telefone", "phone"),
            ("Tipo", "role"),
        ],
    },
    RegistryEntry {
        source: "DtoEmpresa",
        target: "retail_stores",
        fields: &[
            ("_id", "legacy_id"),
            ("NomeFantasia", "name"),
            ("RazaoSocial", "legal_name"),
            ("CNPJ", "cnpj"),
            ("InscricaoEstadual", "state_registration"),
            ("Logradouro", "street"),
            ("Numero", "number"),
            ("Complemento", "complement"),
            ("Cidade", "city"),
            ("UF", "state"),
            ("CEP", "zip_code"),
            ("Email", "email"),
            ("Telefone", "phone"),
        ],
    },
    RegistryEntry {
        source: "DtoCase",
        target: "service_orders",
        fields: &[
            ("_id", "legacy_id"),
            ("Nome", "order_number"),
            ("DataCadastro", "created_at"),
            ("Descricao", "description"),
            ("Cliente", "customer_name"),
            ("Tipo", "service_type"),
            ("Status", "status"),
        ],
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_knows_the_vendor_collections() {
        let registry = MappingRegistry::builtin();
        let entry = registry.lookup("DtoPessoa").unwrap();
        assert_eq!(entry.target, "customers");
        assert_eq!(
            entry.field_mappings().get("NomeFantasia"),
            Some(&"name".to_string())
        );
        assert_eq!(registry.lookup("DtoLancamento").unwrap().target, "fin_transactions");
    }

    #[test]
    fn unknown_collections_have_no_default() {
        let registry = MappingRegistry::builtin();
        assert!(registry.lookup("DtoDesconhecido").is_none());
    }

    #[test]
    fn accepts_an_injected_table() {
        let registry = MappingRegistry::new(vec![RegistryEntry {
            source: "Custom",
            target: "crm_leads",
            fields: &[("Nome", "name")],
        }]);
        assert_eq!(registry.lookup("Custom").unwrap().target, "crm_leads");
        assert!(registry.lookup("DtoPessoa").is_none());
    }
}
