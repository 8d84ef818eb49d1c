use crate::aggregate::Summary;
use crate::locale::Locale;

/// Builds the single user message sent to the language model.
pub fn build_prompt(summary: &Summary, locale: Locale) -> String {
    let currency = locale.currency();
    let mut lines = String::new();
    for agg in &summary.categories {
        let line = match locale {
            Locale::PtBr => format!(
                "- {name}: {currency} {total:.2} ({pct:.1}% do total, {count} gastos)\n",
                name = agg.name,
                total = agg.total.round_dp(2),
                pct = agg.percentage,
                count = agg.count,
            ),
            Locale::EnUs => format!(
                "- {name}: {currency} {total:.2} ({pct:.1}% of total, {count} expenses)\n",
                name = agg.name,
                total = agg.total.round_dp(2),
                pct = agg.percentage,
                count = agg.count,
            ),
        };
        lines.push_str(&line);
    }
    let total = summary.grand_total.round_dp(2);
    let count = summary.record_count;

    let mut prompt = String::new();
    match locale {
        Locale::PtBr => {
            prompt.push_str("Você é um consultor financeiro experiente. Analise os gastos do usuário e forneça uma análise personalizada e prática.\n\n");
            prompt.push_str("**Gastos do mês:**\n");
            prompt.push_str(&format!("Total gasto: {currency} {total:.2}\n"));
            prompt.push_str(&format!("Número de transações: {count}\n\n"));
            prompt.push_str("**Divisão por categoria:**\n");
            prompt.push_str(&lines);
            prompt.push_str(
                "\n**Sua tarefa:**\n\
1. Analise o padrão de gastos do usuário\n\
2. Identifique as categorias que mais consomem o orçamento\n\
3. Forneça 3-5 dicas práticas e específicas para economizar\n\
4. Seja encorajador e positivo\n\
5. Use linguagem clara e amigável\n\n\
Forneça uma análise completa e útil em português brasileiro.",
            );
        }
        Locale::EnUs => {
            prompt.push_str("You are an experienced financial advisor. Analyze the user's expenses and give a personalized, practical analysis.\n\n");
            prompt.push_str("**Spending this month:**\n");
            prompt.push_str(&format!("Total spent: {currency} {total:.2}\n"));
            prompt.push_str(&format!("Number of transactions: {count}\n\n"));
            prompt.push_str("**Breakdown by category:**\n");
            prompt.push_str(&lines);
            prompt.push_str(
                "\n**Your task:**\n\
1. Analyze the user's spending pattern\n\
2. Identify the categories that consume most of the budget\n\
3. Give 3-5 practical, specific tips to save money\n\
4. Be encouraging and positive\n\
5. Use clear and friendly language\n\n\
Write a complete and useful analysis in American English.",
            );
        }
    }
    prompt
}
