//! Static catalog of the destination entities an operator can map a
//! collection onto, grouped by business module. Only a subset has a
//! dedicated import routine; the rest go through the generic importer,
//! which records payloads for visibility without writing business rows.

use actix_web::{HttpResponse, Responder};
use common::model::entity::ImportableEntity;

pub(crate) async fn process() -> impl Responder {
    HttpResponse::Ok().json(importable_entities())
}

fn entity(id: &str, name: &str, description: &str, module: &str) -> ImportableEntity {
    ImportableEntity {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        module: module.to_string(),
    }
}

pub fn importable_entities() -> Vec<ImportableEntity> {
    vec![
        // Cadastros básicos
        entity("customers", "Clientes", "Cadastro de clientes", "Cadastros"),
        entity("suppliers", "Fornecedores", "Cadastro de fornecedores", "Cadastros"),
        entity("products", "Produtos", "Cadastro de produtos", "Cadastros"),
        entity("persons", "Pessoas", "Cadastro unificado de pessoas", "Cadastros"),
        entity("users", "Usuários", "Usuários do sistema", "Cadastros"),
        // Retail / PDV
        entity("retail_stores", "Lojas", "Cadastro de lojas", "Retail"),
        entity("retail_sellers", "Vendedores", "Cadastro de vendedores", "Retail"),
        entity("retail_warehouses", "Depósitos", "Depósitos e estoque", "Retail"),
        entity("retail_price_tables", "Tabelas de Preço", "Tabelas de preço", "Retail"),
        entity("retail_promotions", "Promoções", "Promoções e descontos", "Retail"),
        entity("pos_sales", "Vendas PDV", "Vendas do PDV", "Retail"),
        entity("pos_sessions", "Sessões PDV", "Sessões de caixa", "Retail"),
        // Assistência técnica
        entity("service_orders", "Ordens de Serviço", "O.S. de assistência técnica", "Assistência Técnica"),
        entity("mobile_devices", "Dispositivos", "Celulares e dispositivos", "Assistência Técnica"),
        entity("device_evaluations", "Avaliações", "Avaliações de dispositivos", "Assistência Técnica"),
        entity("device_history", "Histórico Equipamentos", "Histórico de dispositivos", "Assistência Técnica"),
        // Financeiro
        entity("fin_transactions", "Transações Financeiras", "Contas (separação automática)", "Financeiro"),
        entity("fin_accounts_payable", "Contas a Pagar", "Lançamentos a pagar", "Financeiro"),
        entity("fin_accounts_receivable", "Contas a Receber", "Lançamentos a receber", "Financeiro"),
        entity("fin_bank_accounts", "Contas Bancárias", "Contas bancárias", "Financeiro"),
        entity("fin_payment_methods", "Formas de Pagamento", "Meios de pagamento", "Financeiro"),
        entity("fin_cash_flow_categories", "Plano de Contas", "Categorias de fluxo de caixa", "Financeiro"),
        // CRM
        entity("crm_leads", "Leads", "Leads e prospects", "CRM"),
        entity("crm_opportunities", "Oportunidades", "Oportunidades de negócio", "CRM"),
        entity("crm_clients", "Clientes CRM", "Clientes do CRM", "CRM"),
        entity("crm_contracts", "Contratos", "Contratos comerciais", "CRM"),
        entity("crm_campaigns", "Campanhas", "Campanhas de marketing", "CRM"),
        // Compras, vendas e estoque
        entity("purchase_orders", "Pedidos de Compra", "Pedidos de compra", "Compras"),
        entity("sales_orders", "Pedidos de Venda", "Pedidos de venda", "Vendas"),
        entity("stock_transfers", "Transferências", "Transferências de estoque", "Estoque"),
        // Fiscal
        entity("fiscal_notas", "Notas Fiscais", "NF-e/NFC-e emitidas", "Fiscal"),
        entity("fiscal_ncms", "NCMs", "Classificação fiscal NCM", "Fiscal"),
        entity("fiscal_cfops", "CFOPs", "Códigos fiscais", "Fiscal"),
        // RH
        entity("people_funcionarios", "Funcionários", "Cadastro de funcionários", "RH"),
        entity("people_cargos", "Cargos", "Cargos e funções", "RH"),
        entity("people_departamentos", "Departamentos", "Departamentos", "RH"),
        // Projetos / Qualidade
        entity("pc_projects", "Projetos", "Projetos e atividades", "Projetos"),
        entity("pc_clients", "Clientes Projetos", "Clientes de projetos", "Projetos"),
        entity("quality_samples", "Amostras", "Amostras laboratoriais", "Qualidade"),
        entity("quality_lab_reports", "Laudos", "Laudos laboratoriais", "Qualidade"),
        // Comunicação omnichannel
        entity("xos_contacts", "Contatos XOS", "Contatos omnichannel", "XOS"),
        entity("xos_conversations", "Conversas", "Histórico de conversas", "XOS"),
        entity("xos_tickets", "Tickets", "Tickets de atendimento", "XOS"),
        entity("xos_deals", "Negociações", "Negócios em andamento", "XOS"),
        // Suporte
        entity("support_tickets", "Tickets Suporte", "Tickets de suporte", "Suporte"),
        entity("support_knowledge_base", "Base de Conhecimento", "Artigos de ajuda", "Suporte"),
    ]
}
