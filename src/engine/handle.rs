/// Fold one accented Latin letter to its bare ASCII base, if we know it.
///
/// The table covers the Latin-1/Latin-2 repertoire that actually occurs in
/// the cz/sk catalog titles; anything else is treated as a separator.
fn fold_diacritic(ch: char) -> Option<char> {
    let folded = match ch {
        'á' | 'à' | 'â' | 'ä' | 'ă' | 'ā' | 'Á' | 'À' | 'Â' | 'Ä' | 'Ă' | 'Ā' => 'a',
        'č' | 'ç' | 'ć' | 'Č' | 'Ç' | 'Ć' => 'c',
        'ď' | 'Ď' => 'd',
        'é' | 'è' | 'ê' | 'ë' | 'ě' | 'ē' | 'ę' | 'É' | 'È' | 'Ê' | 'Ë' | 'Ě' | 'Ē' | 'Ę' => 'e',
        'í' | 'ì' | 'î' | 'ï' | 'Í' | 'Ì' | 'Î' | 'Ï' => 'i',
        'ľ' | 'ĺ' | 'ł' | 'Ľ' | 'Ĺ' | 'Ł' => 'l',
        'ň' | 'ñ' | 'ń' | 'Ň' | 'Ñ' | 'Ń' => 'n',
        'ó' | 'ò' | 'ô' | 'ö' | 'õ' | 'ő' | 'Ó' | 'Ò' | 'Ô' | 'Ö' | 'Õ' | 'Ő' => 'o',
        'ř' | 'ŕ' | 'Ř' | 'Ŕ' => 'r',
        'š' | 'ś' | 'Š' | 'Ś' => 's',
        'ť' | 'Ť' => 't',
        'ú' | 'ù' | 'û' | 'ü' | 'ů' | 'ű' | 'Ú' | 'Ù' | 'Û' | 'Ü' | 'Ů' | 'Ű' => 'u',
        'ý' | 'ÿ' | 'Ý' => 'y',
        'ž' | 'ź' | 'ż' | 'Ž' | 'Ź' | 'Ż' => 'z',
        _ => return None,
    };
    Some(folded)
}

/// URL-safe slug of a product title: diacritics folded, lowercased,
/// non-alphanumeric runs collapsed to a single `-`, ends trimmed.
pub fn handleize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut prev_dash = false;
    for ch in input.chars() {
        let folded = fold_diacritic(ch)
            .or_else(|| ch.is_ascii_alphanumeric().then(|| ch.to_ascii_lowercase()));
        if let Some(c) = folded {
            out.push(c);
            prev_dash = false;
        } else if !prev_dash {
            out.push('-');
            prev_dash = true;
        }
    }
    out.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::handleize;

    #[test]
    fn handleize_folds_czech_and_slovak_titles() {
        assert_eq!(handleize("Dámské boty Černá"), "damske-boty-cerna");
        assert_eq!(handleize("Kreslo ušiak sivé"), "kreslo-usiak-sive");
        assert_eq!(handleize("Stôl ROZKLADACÍ 160×90"), "stol-rozkladaci-160-90");
    }

    #[test]
    fn handleize_collapses_runs_and_trims_ends() {
        assert_eq!(handleize("  Matrace -- 90 x 200 !!"), "matrace-90-x-200");
        assert_eq!(handleize("###"), "");
        assert_eq!(handleize(""), "");
    }
}
