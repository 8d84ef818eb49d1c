use chrono::{DateTime, NaiveDate, Utc};
use std::str::FromStr;

/// Display language of reports, prompts and user-facing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    PtBr,
    EnUs,
}

const PT_MONTHS: [&str; 12] = [
    "janeiro", "fevereiro", "março", "abril", "maio", "junho", "julho", "agosto", "setembro",
    "outubro", "novembro", "dezembro",
];
const EN_MONTHS: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];

/// Fixed strings used by the renderers and the prompt builder.
pub struct Labels {
    pub uncategorized: &'static str,
    pub no_expenses: &'static str,
    pub date: &'static str,
    pub description: &'static str,
    pub category: &'static str,
    pub amount: &'static str,
    pub total: &'static str,
    pub percentage: &'static str,
    pub app_title: &'static str,
    pub report_title: &'static str,
    pub period: &'static str,
    pub expense_count: &'static str,
    pub total_spent: &'static str,
    pub by_category: &'static str,
    pub details: &'static str,
    pub unauthorized: &'static str,
    pub invalid_request: &'static str,
    pub period_required: &'static str,
    pub invalid_period: &'static str,
    pub fields_required: &'static str,
    pub name_required: &'static str,
    pub negative_amount: &'static str,
    pub expense_not_found: &'static str,
    pub category_not_found: &'static str,
    pub foreign_category: &'static str,
    pub default_category: &'static str,
    pub category_in_use: &'static str,
    pub expense_deleted: &'static str,
    pub category_deleted: &'static str,
}

const PT_LABELS: Labels = Labels {
    uncategorized: "Sem categoria",
    no_expenses: "Nenhum gasto encontrado para este mês",
    date: "Data",
    description: "Descrição",
    category: "Categoria",
    amount: "Valor",
    total: "Total",
    percentage: "Porcentagem",
    app_title: "Meu Orçamento Inteligente",
    report_title: "Relatório de Gastos",
    period: "Período",
    expense_count: "Total de gastos",
    total_spent: "Total gasto",
    by_category: "Gastos por Categoria",
    details: "Detalhamento dos Gastos",
    unauthorized: "Não autorizado",
    invalid_request: "Requisição inválida",
    period_required: "Mês e ano são obrigatórios",
    invalid_period: "Mês inválido",
    fields_required: "Todos os campos são obrigatórios",
    name_required: "Nome da categoria é obrigatório",
    negative_amount: "O valor não pode ser negativo",
    expense_not_found: "Gasto não encontrado",
    category_not_found: "Categoria não encontrada",
    foreign_category: "Categoria pertence a outro usuário",
    default_category: "Não é possível alterar categorias padrão",
    category_in_use: "Não é possível excluir categoria com gastos associados",
    expense_deleted: "Gasto excluído com sucesso",
    category_deleted: "Categoria excluída com sucesso",
};

const EN_LABELS: Labels = Labels {
    uncategorized: "No category",
    no_expenses: "No expenses found for this period",
    date: "Date",
    description: "Description",
    category: "Category",
    amount: "Amount",
    total: "Total",
    percentage: "Percentage",
    app_title: "My Smart Budget",
    report_title: "Expense Report",
    period: "Period",
    expense_count: "Number of expenses",
    total_spent: "Total spent",
    by_category: "Expenses by Category",
    details: "Expense Details",
    unauthorized: "Unauthorized",
    invalid_request: "Invalid request",
    period_required: "Month and year are required",
    invalid_period: "Invalid month",
    fields_required: "All fields are required",
    name_required: "Category name is required",
    negative_amount: "Amount must not be negative",
    expense_not_found: "Expense not found",
    category_not_found: "Category not found",
    foreign_category: "Category belongs to another user",
    default_category: "Default categories cannot be changed",
    category_in_use: "Cannot delete a category that still has expenses",
    expense_deleted: "Expense deleted",
    category_deleted: "Category deleted",
};

impl Locale {
    pub fn labels(self) -> &'static Labels {
        match self {
            Locale::PtBr => &PT_LABELS,
            Locale::EnUs => &EN_LABELS,
        }
    }

    pub fn currency(self) -> &'static str {
        match self {
            Locale::PtBr => "R$",
            Locale::EnUs => "$",
        }
    }

    pub fn html_lang(self) -> &'static str {
        match self {
            Locale::PtBr => "pt-BR",
            Locale::EnUs => "en-US",
        }
    }

    pub fn format_day(self, date: NaiveDate) -> String {
        match self {
            Locale::PtBr => date.format("%d/%m/%Y").to_string(),
            Locale::EnUs => date.format("%m/%d/%Y").to_string(),
        }
    }

    pub fn format_date(self, at: DateTime<Utc>) -> String {
        self.format_day(at.date_naive())
    }

    /// "outubro de 2025" / "October 2025"
    pub fn month_title(self, year: i32, month: u32) -> String {
        let idx = month.clamp(1, 12) as usize - 1;
        match self {
            Locale::PtBr => format!("{} de {year}", PT_MONTHS[idx]),
            Locale::EnUs => format!("{} {year}", EN_MONTHS[idx]),
        }
    }
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "pt-br" | "pt" => Ok(Locale::PtBr),
            "en-us" | "en" => Ok(Locale::EnUs),
            other => Err(format!("unsupported locale: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_locale_names() {
        assert_eq!("pt-BR".parse::<Locale>().unwrap(), Locale::PtBr);
        assert_eq!("en_US".parse::<Locale>().unwrap(), Locale::EnUs);
        assert!("fr-FR".parse::<Locale>().is_err());
    }

    #[test]
    fn formats_dates_per_locale() {
        let day = NaiveDate::from_ymd_opt(2025, 10, 3).unwrap();
        assert_eq!(Locale::PtBr.format_day(day), "03/10/2025");
        assert_eq!(Locale::EnUs.format_day(day), "10/03/2025");
        assert_eq!(Locale::PtBr.month_title(2025, 10), "outubro de 2025");
        assert_eq!(Locale::EnUs.month_title(2025, 10), "October 2025");
    }
}
