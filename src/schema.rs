use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One purchase transaction, as laid out on an `FL-AV-P-*` (or `Modelo Cebola`) sheet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    #[serde(default, deserialize_with = "lenient::text")]
    pub id: String,

    #[serde(default, deserialize_with = "lenient::text")]
    #[schemars(description = "Workbook sheet the purchase was imported from; empty for purchases created by hand")]
    pub sheet_name: String,

    #[serde(default, deserialize_with = "lenient::flag")]
    #[schemars(description = "Selects the alternate totals branch where operating expenses are derived instead of entered")]
    pub modelo_cebola: bool,

    #[serde(default, deserialize_with = "lenient::number")]
    #[schemars(with = "Option<f64>")]
    pub numero_compra: Option<f64>,

    #[serde(default, deserialize_with = "lenient::text")]
    #[schemars(description = "Reference such as FL-AV-P-007, used to match cash ledger rows")]
    pub referencia: String,

    #[serde(default, deserialize_with = "lenient::text")]
    #[schemars(description = "Purchase date as YYYY-MM-DD, or empty")]
    pub data: String,

    #[serde(default, deserialize_with = "lenient::text")]
    pub fornecedor: String,

    #[serde(default, deserialize_with = "lenient::text")]
    pub exportador: String,

    #[serde(default, deserialize_with = "lenient::text")]
    pub proforma_num: String,

    #[serde(default, deserialize_with = "lenient::text")]
    pub fatura_num: String,

    #[serde(default, deserialize_with = "lenient::text")]
    pub status: String,

    #[serde(default, deserialize_with = "lenient::text")]
    pub importador: String,

    #[serde(default, deserialize_with = "lenient::text")]
    pub transportadora: String,

    #[serde(default, deserialize_with = "lenient::text")]
    #[schemars(description = "Product type shown as Produto/Tipo")]
    pub tipo_cebola: String,

    #[serde(default, deserialize_with = "lenient::number")]
    #[schemars(with = "Option<f64>", description = "Commercial exchange rate (B13)")]
    pub tx_comercial: Option<f64>,

    #[serde(default, deserialize_with = "lenient::number")]
    #[schemars(with = "Option<f64>", description = "Parallel exchange rate (B14)")]
    pub tx_paralelo: Option<f64>,

    #[serde(default, deserialize_with = "lenient::number")]
    #[schemars(with = "Option<f64>", description = "Freight total for the whole purchase (I20)")]
    pub custo_frete_total: Option<f64>,

    #[serde(default, deserialize_with = "lenient::number")]
    #[schemars(with = "Option<f64>", description = "Dispatch total for the whole purchase (J20)")]
    pub despacho_total: Option<f64>,

    #[serde(default, deserialize_with = "lenient::number")]
    #[schemars(with = "Option<f64>", description = "Flat currency-exchange fee (D21)")]
    pub taxa_c_cambio: Option<f64>,

    #[serde(default, deserialize_with = "lenient::number")]
    #[schemars(with = "Option<f64>", description = "Presumed-tax rate (N23); 0.0291 when absent")]
    pub taxa_presumido: Option<f64>,

    #[serde(default, deserialize_with = "lenient::number")]
    #[schemars(with = "Option<f64>", description = "Operational profit (L24)")]
    pub lucro_operacional: Option<f64>,

    #[serde(default, deserialize_with = "lenient::number")]
    #[schemars(with = "Option<f64>", description = "Operational expenses (K32); ignored by the onion model")]
    pub despesas_operacionais: Option<f64>,

    #[serde(default, deserialize_with = "lenient::text")]
    #[schemars(description = "Informational reference copied from P20")]
    pub nfvf: String,

    #[serde(default, deserialize_with = "lenient::records")]
    #[schemars(with = "Vec<Item>")]
    pub items: Vec<Item>,

    #[serde(default, deserialize_with = "lenient::record")]
    #[schemars(with = "Option<ComputedBlock>")]
    pub computed: Option<ComputedBlock>,
}

/// One line of a purchase, historically one per box.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    #[serde(default, deserialize_with = "lenient::text")]
    pub id: String,

    #[serde(default, deserialize_with = "lenient::text")]
    pub caixa: String,

    #[serde(default, deserialize_with = "lenient::number")]
    #[schemars(with = "Option<f64>")]
    pub quantidade: Option<f64>,

    #[serde(default, deserialize_with = "lenient::number")]
    #[schemars(with = "Option<f64>", description = "Invoice unit price in dollars")]
    pub dollar: Option<f64>,

    #[serde(default, deserialize_with = "lenient::number")]
    #[schemars(with = "Option<f64>", description = "PF unit price in dollars")]
    pub dollar_pf: Option<f64>,

    #[serde(default, deserialize_with = "lenient::number")]
    #[schemars(with = "Option<f64>", description = "Sale unit price")]
    pub venda: Option<f64>,

    #[serde(flatten)]
    pub figures: ItemFigures,
}

impl Item {
    pub fn new(id: String, caixa: impl Into<String>) -> Self {
        Self {
            id,
            caixa: caixa.into(),
            ..Default::default()
        }
    }
}

/// Per-unit figures derived by the engine. Zero until the first computation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ItemFigures {
    #[serde(default, deserialize_with = "lenient::amount")]
    #[schemars(with = "f64")]
    pub fatura_em: f64,
    #[serde(default, deserialize_with = "lenient::amount")]
    #[schemars(with = "f64")]
    pub pf_em: f64,
    #[serde(default, deserialize_with = "lenient::amount")]
    #[schemars(with = "f64")]
    pub custo: f64,
    #[serde(default, deserialize_with = "lenient::amount")]
    #[schemars(with = "f64")]
    pub custo_frete: f64,
    #[serde(default, deserialize_with = "lenient::amount")]
    #[schemars(with = "f64")]
    pub despacho: f64,
    #[serde(default, deserialize_with = "lenient::amount")]
    #[schemars(with = "f64")]
    pub total_fronteira: f64,
    #[serde(default, deserialize_with = "lenient::amount")]
    #[schemars(with = "f64")]
    pub presumido: f64,
    #[serde(default, deserialize_with = "lenient::amount")]
    #[schemars(with = "f64")]
    pub valor_final: f64,
}

/// Purchase-level totals. The `K*`/`L23` names are the workbook cells they mirror and
/// are part of the exported document.
#[allow(non_snake_case)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct ComputedBlock {
    pub total_qty: f64,
    pub total_dollar: f64,
    pub total_dollar_pf: f64,
    pub total_fatura_em: f64,
    pub total_pf_em: f64,
    pub total_custo: f64,
    pub total_venda: f64,
    pub total_presumido: f64,
    pub total_valor_final: f64,

    #[serde(rename = "K20")]
    #[schemars(description = "Total fronteira: weighted cost plus freight, dispatch and exchange fee")]
    pub K20: f64,
    #[serde(rename = "K23")]
    pub K23: f64,
    #[serde(rename = "L23")]
    pub L23: f64,
    #[serde(rename = "K24")]
    pub K24: f64,
    #[serde(rename = "K25")]
    pub K25: f64,
    #[serde(rename = "K29")]
    pub K29: f64,
    #[serde(rename = "K30")]
    pub K30: f64,
    #[serde(rename = "K31")]
    pub K31: f64,
    #[serde(rename = "K32")]
    pub K32: f64,
    #[serde(rename = "K33")]
    #[schemars(description = "Custo conta corrente, written into matching cash ledger credits")]
    pub K33: f64,
}

/// One line of the cash ledger (`CAIXA FL-AV-P`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    #[serde(default, deserialize_with = "lenient::text")]
    pub id: String,

    #[serde(default, deserialize_with = "lenient::text")]
    #[schemars(description = "Entry date as YYYY-MM-DD, or empty")]
    pub data: String,

    #[serde(default, deserialize_with = "lenient::text")]
    pub historico: String,

    #[serde(default, deserialize_with = "lenient::number")]
    #[schemars(with = "Option<f64>")]
    pub debito: Option<f64>,

    #[serde(default, deserialize_with = "lenient::number")]
    #[schemars(with = "Option<f64>")]
    pub credito: Option<f64>,

    #[serde(default, deserialize_with = "lenient::amount")]
    #[schemars(with = "f64", description = "Running balance, recomputed over the whole ledger")]
    pub saldo: f64,
}

/// Dropdown vocabularies for the status and product-type fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MetaOptions {
    #[serde(default, deserialize_with = "lenient::texts")]
    #[schemars(with = "Vec<String>")]
    pub status_options: Vec<String>,

    #[serde(default, deserialize_with = "lenient::texts")]
    #[schemars(with = "Vec<String>")]
    pub tipo_options: Vec<String>,
}

/// The persisted document: everything that survives a reload or an export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AppState {
    #[serde(default, deserialize_with = "lenient::records")]
    #[schemars(with = "Vec<Purchase>")]
    pub purchases: Vec<Purchase>,

    #[serde(default, deserialize_with = "lenient::records")]
    #[schemars(with = "Vec<LedgerEntry>")]
    pub ledger: Vec<LedgerEntry>,

    #[serde(default, deserialize_with = "lenient::record_or_default")]
    #[schemars(with = "MetaOptions")]
    pub meta: MetaOptions,
}

impl AppState {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(AppState)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

/// Field deserializers that coerce instead of failing, so a damaged store or a hand-edited
/// export still loads.
mod lenient {
    use crate::utils::safe_number_text;
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    fn coerce_number(value: &Value) -> Option<f64> {
        match value {
            Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
            Value::String(s) => safe_number_text(s),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    fn coerce_text(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.as_f64().map(|v| v.to_string()).unwrap_or_default(),
            Value::Bool(b) => b.to_string(),
            _ => String::new(),
        }
    }

    pub fn number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        let value = Value::deserialize(d)?;
        Ok(coerce_number(&value))
    }

    pub fn amount<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        Ok(number(d)?.unwrap_or(0.0))
    }

    pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        let value = Value::deserialize(d)?;
        Ok(coerce_text(&value))
    }

    pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        let value = Value::deserialize(d)?;
        Ok(match value {
            Value::Bool(b) => b,
            Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0 && !v.is_nan()),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) => true,
            Value::Null => false,
        })
    }

    pub fn texts<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        let value = Value::deserialize(d)?;
        Ok(match value {
            Value::Array(values) => values.iter().map(coerce_text).collect(),
            _ => Vec::new(),
        })
    }

    pub fn records<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let value = Value::deserialize(d)?;
        let Value::Array(values) = value else {
            return Ok(Vec::new());
        };

        let total = values.len();
        let records: Vec<T> = values
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect();
        if records.len() < total {
            log::warn!(
                "Dropped {} malformed record(s) while loading",
                total - records.len()
            );
        }
        Ok(records)
    }

    pub fn record<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let value = Value::deserialize(d)?;
        if value.is_object() {
            Ok(serde_json::from_value(value).ok())
        } else {
            Ok(None)
        }
    }

    pub fn record_or_default<'de, D, T>(d: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned + Default,
    {
        Ok(record(d)?.unwrap_or_default())
    }
}
