//! Record mapping: canonical-header record to [`CanonicalRow`].
//!
//! Which header spellings feed which field is data, not control flow: see
//! [`FIELD_ALIASES`]. The first alias present in a record wins.
use crate::types::{CanonicalRow, RawRecord};
use crate::util::{to_nullable_number, to_number};

/// Target fields of a [`CanonicalRow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Famille,
    SsFamille,
    Fournisseur,
    CaTotalSsFamille,
    CaFournisseurDansSsf,
    CaPartDuSsf,
    MargeArriere,
    ScoreFournisseur,
}

/// Canonical header aliases per field, highest priority first.
pub const FIELD_ALIASES: &[(Field, &[&str])] = &[
    (Field::Famille, &["famille"]),
    (Field::SsFamille, &["ssfamille", "ss_famille", "sous_sous_famille"]),
    (Field::Fournisseur, &["fournisseur"]),
    (Field::CaTotalSsFamille, &["ca_total_ssfamille", "ca_total_ss_famille"]),
    (Field::CaFournisseurDansSsf, &["ca_fournisseur_dans_ssf"]),
    (Field::CaPartDuSsf, &["ca_part_du_ssf_pct", "ca_part_du_ssf"]),
    (Field::MargeArriere, &["marge_arriere_pct", "marge_arriere"]),
    (Field::ScoreFournisseur, &["score_fournisseur_pct", "score_fournisseur"]),
];

pub fn aliases(field: Field) -> &'static [&'static str] {
    FIELD_ALIASES
        .iter()
        .find(|(f, _)| *f == field)
        .map(|(_, a)| *a)
        .unwrap_or(&[])
}

/// Raw cell for `field`: the value under the first alias the record has.
pub fn resolve<'a>(record: &'a RawRecord, field: Field) -> Option<&'a str> {
    aliases(field)
        .iter()
        .find_map(|key| record.get(*key))
        .map(String::as_str)
}

fn text(record: &RawRecord, field: Field) -> String {
    resolve(record, field).unwrap_or("").trim().to_string()
}

/// Build one row. Total: missing cells become empty text, `0`, `None`, or a
/// derived score.
pub fn map_record(record: &RawRecord) -> CanonicalRow {
    let ca_part_du_ssf = to_number(resolve(record, Field::CaPartDuSsf));
    let marge_arriere = to_nullable_number(resolve(record, Field::MargeArriere));
    let score_fournisseur = match resolve(record, Field::ScoreFournisseur) {
        Some(raw) if !raw.is_empty() => to_number(raw),
        _ => CanonicalRow::derived_score(ca_part_du_ssf, marge_arriere),
    };

    CanonicalRow {
        famille: text(record, Field::Famille),
        ss_famille: text(record, Field::SsFamille),
        fournisseur: text(record, Field::Fournisseur),
        ca_total_ss_famille: to_number(resolve(record, Field::CaTotalSsFamille)),
        ca_fournisseur_dans_ssf: to_number(resolve(record, Field::CaFournisseurDansSsf)),
        ca_part_du_ssf,
        marge_arriere,
        score_fournisseur,
    }
}
