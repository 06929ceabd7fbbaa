use std::collections::HashMap;

use lazy_static::lazy_static;

const US_STATES: &[(&str, &str)] = &[
    ("alabama", "al"),
    ("alaska", "ak"),
    ("american samoa", "as"),
    ("arizona", "az"),
    ("arkansas", "ar"),
    ("california", "ca"),
    ("colorado", "co"),
    ("connecticut", "ct"),
    ("delaware", "de"),
    ("district of columbia", "dc"),
    ("federated states of micronesia", "fm"),
    ("florida", "fl"),
    ("georgia", "ga"),
    ("guam", "gu"),
    ("hawaii", "hi"),
    ("idaho", "id"),
    ("illinois", "il"),
    ("indiana", "in"),
    ("iowa", "ia"),
    ("kansas", "ks"),
    ("kentucky", "ky"),
    ("louisiana", "la"),
    ("maine", "me"),
    ("marshall islands", "mh"),
    ("maryland", "md"),
    ("massachusetts", "ma"),
    ("michigan", "mi"),
    ("minnesota", "mn"),
    ("mississippi", "ms"),
    ("missouri", "mo"),
    ("montana", "mt"),
    ("nebraska", "ne"),
    ("nevada", "nv"),
    ("new hampshire", "nh"),
    ("new jersey", "nj"),
    ("new mexico", "nm"),
    ("new york", "ny"),
    ("north carolina", "nc"),
    ("north dakota", "nd"),
    ("northern mariana islands", "mp"),
    ("ohio", "oh"),
    ("oklahoma", "ok"),
    ("oregon", "or"),
    ("palau", "pw"),
    ("pennsylvania", "pa"),
    ("puerto rico", "pr"),
    ("rhode island", "ri"),
    ("south carolina", "sc"),
    ("south dakota", "sd"),
    ("tennessee", "tn"),
    ("texas", "tx"),
    ("utah", "ut"),
    ("vermont", "vt"),
    ("virgin islands", "vi"),
    ("virginia", "va"),
    ("washington", "wa"),
    ("west virginia", "wv"),
    ("wisconsin", "wi"),
    ("wyoming", "wy"),
];

// ISO 3166-1 English short names plus a few common aliases.
const COUNTRIES: &[(&str, &str)] = &[
    ("afghanistan", "af"),
    ("aland islands", "ax"),
    ("albania", "al"),
    ("algeria", "dz"),
    ("american samoa", "as"),
    ("andorra", "ad"),
    ("angola", "ao"),
    ("anguilla", "ai"),
    ("antarctica", "aq"),
    ("antigua and barbuda", "ag"),
    ("argentina", "ar"),
    ("armenia", "am"),
    ("aruba", "aw"),
    ("australia", "au"),
    ("austria", "at"),
    ("azerbaijan", "az"),
    ("bahamas", "bs"),
    ("bahrain", "bh"),
    ("bangladesh", "bd"),
    ("barbados", "bb"),
    ("belarus", "by"),
    ("belgium", "be"),
    ("belize", "bz"),
    ("benin", "bj"),
    ("bermuda", "bm"),
    ("bhutan", "bt"),
    ("bolivia", "bo"),
    ("bonaire, sint eustatius and saba", "bq"),
    ("bosnia and herzegovina", "ba"),
    ("botswana", "bw"),
    ("bouvet island", "bv"),
    ("brazil", "br"),
    ("british indian ocean territory", "io"),
    ("brunei", "bn"),
    ("brunei darussalam", "bn"),
    ("bulgaria", "bg"),
    ("burkina faso", "bf"),
    ("burundi", "bi"),
    ("cabo verde", "cv"),
    ("cape verde", "cv"),
    ("cambodia", "kh"),
    ("cameroon", "cm"),
    ("canada", "ca"),
    ("cayman islands", "ky"),
    ("central african republic", "cf"),
    ("chad", "td"),
    ("chile", "cl"),
    ("china", "cn"),
    ("christmas island", "cx"),
    ("cocos (keeling) islands", "cc"),
    ("colombia", "co"),
    ("comoros", "km"),
    ("congo", "cg"),
    ("democratic republic of the congo", "cd"),
    ("cook islands", "ck"),
    ("costa rica", "cr"),
    ("cote d'ivoire", "ci"),
    ("ivory coast", "ci"),
    ("croatia", "hr"),
    ("cuba", "cu"),
    ("curacao", "cw"),
    ("cyprus", "cy"),
    ("czechia", "cz"),
    ("czech republic", "cz"),
    ("denmark", "dk"),
    ("djibouti", "dj"),
    ("dominica", "dm"),
    ("dominican republic", "do"),
    ("ecuador", "ec"),
    ("egypt", "eg"),
    ("el salvador", "sv"),
    ("equatorial guinea", "gq"),
    ("eritrea", "er"),
    ("estonia", "ee"),
    ("eswatini", "sz"),
    ("swaziland", "sz"),
    ("ethiopia", "et"),
    ("falkland islands", "fk"),
    ("faroe islands", "fo"),
    ("fiji", "fj"),
    ("finland", "fi"),
    ("france", "fr"),
    ("french guiana", "gf"),
    ("french polynesia", "pf"),
    ("french southern territories", "tf"),
    ("gabon", "ga"),
    ("gambia", "gm"),
    ("georgia", "ge"),
    ("germany", "de"),
    ("ghana", "gh"),
    ("gibraltar", "gi"),
    ("greece", "gr"),
    ("greenland", "gl"),
    ("grenada", "gd"),
    ("guadeloupe", "gp"),
    ("guam", "gu"),
    ("guatemala", "gt"),
    ("guernsey", "gg"),
    ("guinea", "gn"),
    ("guinea-bissau", "gw"),
    ("guyana", "gy"),
    ("haiti", "ht"),
    ("heard island and mcdonald islands", "hm"),
    ("holy see", "va"),
    ("vatican city", "va"),
    ("honduras", "hn"),
    ("hong kong", "hk"),
    ("hungary", "hu"),
    ("iceland", "is"),
    ("india", "in"),
    ("indonesia", "id"),
    ("iran", "ir"),
    ("iraq", "iq"),
    ("ireland", "ie"),
    ("isle of man", "im"),
    ("israel", "il"),
    ("italy", "it"),
    ("jamaica", "jm"),
    ("japan", "jp"),
    ("jersey", "je"),
    ("jordan", "jo"),
    ("kazakhstan", "kz"),
    ("kenya", "ke"),
    ("kiribati", "ki"),
    ("north korea", "kp"),
    ("south korea", "kr"),
    ("korea, republic of", "kr"),
    ("kuwait", "kw"),
    ("kyrgyzstan", "kg"),
    ("laos", "la"),
    ("latvia", "lv"),
    ("lebanon", "lb"),
    ("lesotho", "ls"),
    ("liberia", "lr"),
    ("libya", "ly"),
    ("liechtenstein", "li"),
    ("lithuania", "lt"),
    ("luxembourg", "lu"),
    ("macao", "mo"),
    ("macau", "mo"),
    ("madagascar", "mg"),
    ("malawi", "mw"),
    ("malaysia", "my"),
    ("maldives", "mv"),
    ("mali", "ml"),
    ("malta", "mt"),
    ("marshall islands", "mh"),
    ("martinique", "mq"),
    ("mauritania", "mr"),
    ("mauritius", "mu"),
    ("mayotte", "yt"),
    ("mexico", "mx"),
    ("micronesia", "fm"),
    ("moldova", "md"),
    ("monaco", "mc"),
    ("mongolia", "mn"),
    ("montenegro", "me"),
    ("montserrat", "ms"),
    ("morocco", "ma"),
    ("mozambique", "mz"),
    ("myanmar", "mm"),
    ("burma", "mm"),
    ("namibia", "na"),
    ("nauru", "nr"),
    ("nepal", "np"),
    ("netherlands", "nl"),
    ("the netherlands", "nl"),
    ("new caledonia", "nc"),
    ("new zealand", "nz"),
    ("nicaragua", "ni"),
    ("niger", "ne"),
    ("nigeria", "ng"),
    ("niue", "nu"),
    ("norfolk island", "nf"),
    ("north macedonia", "mk"),
    ("macedonia", "mk"),
    ("northern mariana islands", "mp"),
    ("norway", "no"),
    ("oman", "om"),
    ("pakistan", "pk"),
    ("palau", "pw"),
    ("palestine", "ps"),
    ("panama", "pa"),
    ("papua new guinea", "pg"),
    ("paraguay", "py"),
    ("peru", "pe"),
    ("philippines", "ph"),
    ("pitcairn", "pn"),
    ("poland", "pl"),
    ("portugal", "pt"),
    ("puerto rico", "pr"),
    ("qatar", "qa"),
    ("reunion", "re"),
    ("romania", "ro"),
    ("russia", "ru"),
    ("russian federation", "ru"),
    ("rwanda", "rw"),
    ("saint barthelemy", "bl"),
    ("saint helena", "sh"),
    ("saint kitts and nevis", "kn"),
    ("saint lucia", "lc"),
    ("saint martin", "mf"),
    ("saint pierre and miquelon", "pm"),
    ("saint vincent and the grenadines", "vc"),
    ("samoa", "ws"),
    ("san marino", "sm"),
    ("sao tome and principe", "st"),
    ("saudi arabia", "sa"),
    ("senegal", "sn"),
    ("serbia", "rs"),
    ("seychelles", "sc"),
    ("sierra leone", "sl"),
    ("singapore", "sg"),
    ("sint maarten", "sx"),
    ("slovakia", "sk"),
    ("slovenia", "si"),
    ("solomon islands", "sb"),
    ("somalia", "so"),
    ("south africa", "za"),
    ("south georgia and the south sandwich islands", "gs"),
    ("south sudan", "ss"),
    ("spain", "es"),
    ("sri lanka", "lk"),
    ("sudan", "sd"),
    ("suriname", "sr"),
    ("svalbard and jan mayen", "sj"),
    ("sweden", "se"),
    ("switzerland", "ch"),
    ("syria", "sy"),
    ("taiwan", "tw"),
    ("tajikistan", "tj"),
    ("tanzania", "tz"),
    ("thailand", "th"),
    ("timor-leste", "tl"),
    ("east timor", "tl"),
    ("togo", "tg"),
    ("tokelau", "tk"),
    ("tonga", "to"),
    ("trinidad and tobago", "tt"),
    ("tunisia", "tn"),
    ("turkey", "tr"),
    ("turkiye", "tr"),
    ("turkmenistan", "tm"),
    ("turks and caicos islands", "tc"),
    ("tuvalu", "tv"),
    ("uganda", "ug"),
    ("ukraine", "ua"),
    ("united arab emirates", "ae"),
    ("united kingdom", "gb"),
    ("great britain", "gb"),
    ("uk", "gb"),
    ("united states", "us"),
    ("united states of america", "us"),
    ("usa", "us"),
    ("united states minor outlying islands", "um"),
    ("uruguay", "uy"),
    ("uzbekistan", "uz"),
    ("vanuatu", "vu"),
    ("venezuela", "ve"),
    ("vietnam", "vn"),
    ("viet nam", "vn"),
    ("british virgin islands", "vg"),
    ("us virgin islands", "vi"),
    ("wallis and futuna", "wf"),
    ("western sahara", "eh"),
    ("yemen", "ye"),
    ("zambia", "zm"),
    ("zimbabwe", "zw"),
];

lazy_static! {
    static ref STATE_CODES: HashMap<&'static str, &'static str> =
        US_STATES.iter().copied().collect();
    static ref COUNTRY_CODES: HashMap<&'static str, &'static str> =
        COUNTRIES.iter().copied().collect();
}

/// Lowercased two-letter US state code. Two-letter input is taken as a
/// code already; unknown names pass through lowercased.
pub fn us_state_code(raw: &str) -> String {
    to_code(raw, &STATE_CODES)
}

/// Lowercased ISO 3166-1 alpha-2 country code, same fallback rules as
/// [`us_state_code`].
pub fn country_code(raw: &str) -> String {
    to_code(raw, &COUNTRY_CODES)
}

fn to_code(raw: &str, table: &HashMap<&'static str, &'static str>) -> String {
    let name = raw
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    if name.chars().count() == 2 {
        return name;
    }
    table
        .get(name.as_str())
        .map(|code| code.to_string())
        .unwrap_or(name)
}
