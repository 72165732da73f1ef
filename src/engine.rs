use crate::schema::{ComputedBlock, Item, ItemFigures, Purchase};
use crate::utils::{or_default, or_zero, DEFAULT_TAXA_PRESUMIDO};

// Purchase-level inputs after coercion
struct Rates {
    tx_comercial: f64,
    tx_paralelo: f64,
    taxa_presumido: f64,
    custo_frete_total: f64,
    despacho_total: f64,
    taxa_c_cambio: f64,
    lucro_operacional: f64,
    despesas_operacionais: f64,
}

impl Rates {
    fn from_purchase(purchase: &Purchase) -> Self {
        Self {
            tx_comercial: or_zero(purchase.tx_comercial),
            tx_paralelo: or_zero(purchase.tx_paralelo),
            taxa_presumido: or_default(purchase.taxa_presumido, DEFAULT_TAXA_PRESUMIDO),
            custo_frete_total: or_zero(purchase.custo_frete_total),
            despacho_total: or_zero(purchase.despacho_total),
            taxa_c_cambio: or_zero(purchase.taxa_c_cambio),
            lucro_operacional: or_zero(purchase.lucro_operacional),
            despesas_operacionais: or_zero(purchase.despesas_operacionais),
        }
    }
}

/// Recomputes every derived figure of a purchase, cell for cell with the workbook.
///
/// Item rows get *unit* figures: freight (`I`) and dispatch (`J`) are the purchase totals
/// divided by the total quantity and the same share is written on every row, so an item's
/// `total_fronteira` is not scaled by its quantity. Row 20 totals, on the other hand, weight
/// every unit figure by the item's own quantity, and `K20` adds the freight and dispatch
/// totals on top of the weighted cost. Saved data depends on this asymmetry.
pub fn calc_purchase(purchase: &Purchase) -> Purchase {
    let rates = Rates::from_purchase(purchase);

    let total_qty: f64 = purchase.items.iter().map(|it| or_zero(it.quantidade)).sum();
    let frete_unit = if total_qty > 0.0 {
        rates.custo_frete_total / total_qty
    } else {
        0.0
    };
    let despacho_unit = if total_qty > 0.0 {
        rates.despacho_total / total_qty
    } else {
        0.0
    };

    let items: Vec<Item> = purchase
        .items
        .iter()
        .map(|it| Item {
            figures: item_figures(it, &rates, frete_unit, despacho_unit),
            ..it.clone()
        })
        .collect();

    let weighted = |field: fn(&Item) -> f64| -> f64 {
        items
            .iter()
            .map(|it| or_zero(it.quantidade) * field(it))
            .sum()
    };

    let mut computed = ComputedBlock {
        total_qty,
        total_dollar: weighted(|it| or_zero(it.dollar)),
        total_dollar_pf: weighted(|it| or_zero(it.dollar_pf)),
        total_fatura_em: weighted(|it| it.figures.fatura_em),
        total_pf_em: weighted(|it| it.figures.pf_em),
        total_custo: weighted(|it| it.figures.custo),
        total_venda: weighted(|it| or_zero(it.venda)),
        total_presumido: weighted(|it| it.figures.presumido),
        total_valor_final: weighted(|it| it.figures.valor_final),
        ..Default::default()
    };

    computed.K20 = computed.total_custo
        + rates.custo_frete_total
        + rates.despacho_total
        + rates.taxa_c_cambio;

    computed.K23 = computed.total_valor_final;
    computed.L23 = computed.K23 * rates.taxa_presumido;
    computed.K24 = computed.K23 - computed.L23;
    computed.K25 = computed.K24 - rates.lucro_operacional;

    computed.K29 = computed.K20;
    computed.K30 = computed.L23;
    computed.K31 = rates.lucro_operacional;
    computed.K32 = if purchase.modelo_cebola {
        computed.total_valor_final - computed.K29 - computed.K30 - computed.K31
    } else {
        rates.despesas_operacionais
    };
    computed.K33 = computed.K29 + computed.K30 + computed.K31 + computed.K32;

    Purchase {
        items,
        computed: Some(computed),
        ..purchase.clone()
    }
}

fn item_figures(item: &Item, rates: &Rates, frete_unit: f64, despacho_unit: f64) -> ItemFigures {
    let dollar = or_zero(item.dollar);
    let dollar_pf = or_zero(item.dollar_pf);
    let venda = or_zero(item.venda);

    let fatura_em = dollar * rates.tx_comercial;
    let pf_em = dollar_pf * rates.tx_paralelo;
    let custo = fatura_em + pf_em;
    let presumido = venda * rates.taxa_presumido;

    ItemFigures {
        fatura_em,
        pf_em,
        custo,
        custo_frete: frete_unit,
        despacho: despacho_unit,
        total_fronteira: custo + frete_unit + despacho_unit,
        presumido,
        valor_final: venda + presumido,
    }
}
