//! Representative snapshots for five large Ibovespa constituents.
//!
//! Used when no live collector is configured and as shared test fixtures.
//! Values are illustrative, in BRL.

use crate::CompanyFinancialRecord;

#[allow(clippy::too_many_arguments)]
fn snapshot(
    ticker: &str,
    company_name: &str,
    sector: &str,
    market: [f64; 3],
    income: [f64; 3],
    cash_flow: [f64; 2],
    balance: [f64; 10],
) -> CompanyFinancialRecord {
    let [market_cap, stock_price, shares_outstanding] = market;
    let [revenue, ebit, net_income] = income;
    let [depreciation_amortization, capex] = cash_flow;
    let [total_assets, total_debt, equity, current_assets, current_liabilities, cash, accounts_receivable, inventory, accounts_payable, property_plant_equipment] =
        balance;

    CompanyFinancialRecord {
        ticker: ticker.to_string(),
        company_name: company_name.to_string(),
        sector: Some(sector.to_string()),
        as_of: None,
        market_cap: Some(market_cap),
        stock_price: Some(stock_price),
        shares_outstanding: Some(shares_outstanding),
        revenue: Some(revenue),
        ebit: Some(ebit),
        net_income: Some(net_income),
        depreciation_amortization: Some(depreciation_amortization),
        capex: Some(capex),
        total_assets: Some(total_assets),
        total_debt: Some(total_debt),
        equity: Some(equity),
        current_assets: Some(current_assets),
        current_liabilities: Some(current_liabilities),
        cash: Some(cash),
        accounts_receivable: Some(accounts_receivable),
        inventory: Some(inventory),
        accounts_payable: Some(accounts_payable),
        property_plant_equipment: Some(property_plant_equipment),
    }
}

pub fn petr4() -> CompanyFinancialRecord {
    snapshot(
        "PETR4",
        "Petróleo Brasileiro S.A. - Petrobras",
        "Energia",
        [502e9, 38.50, 13.04e9],
        [450e9, 200e9, 100e9],
        [80e9, 60e9],
        [1.3e12, 400e9, 500e9, 300e9, 180e9, 70e9, 90e9, 50e9, 80e9, 800e9],
    )
}

pub fn vale3() -> CompanyFinancialRecord {
    snapshot(
        "VALE3",
        "Vale S.A.",
        "Mineração",
        [280e9, 61.50, 4.55e9],
        [220e9, 70e9, 40e9],
        [25e9, 22e9],
        [650e9, 70e9, 280e9, 150e9, 100e9, 40e9, 50e9, 30e9, 40e9, 450e9],
    )
}

pub fn itub4() -> CompanyFinancialRecord {
    snapshot(
        "ITUB4",
        "Itaú Unibanco Holding S.A.",
        "Financeiro",
        [300e9, 32.50, 9.23e9],
        [200e9, 75e9, 40e9],
        [10e9, 8e9],
        [2.8e12, 2.2e12, 220e9, 1.8e12, 1.7e12, 200e9, 0.0, 0.0, 0.0, 60e9],
    )
}

pub fn bbdc4() -> CompanyFinancialRecord {
    snapshot(
        "BBDC4",
        "Banco Bradesco S.A.",
        "Financeiro",
        [135e9, 12.80, 10.5e9],
        [160e9, 30e9, 15e9],
        [8e9, 5e9],
        [2.0e12, 1.6e12, 150e9, 1.4e12, 1.3e12, 100e9, 0.0, 0.0, 0.0, 40e9],
    )
}

pub fn wege3() -> CompanyFinancialRecord {
    snapshot(
        "WEGE3",
        "WEG S.A.",
        "Industrial",
        [165e9, 39.30, 4.2e9],
        [32e9, 6e9, 5e9],
        [1e9, 1.5e9],
        [50e9, 10e9, 25e9, 30e9, 15e9, 5e9, 8e9, 10e9, 7e9, 15e9],
    )
}

/// The full sample universe, in index order.
pub fn ibovespa_sample() -> Vec<CompanyFinancialRecord> {
    vec![petr4(), vale3(), itub4(), bbdc4(), wege3()]
}
