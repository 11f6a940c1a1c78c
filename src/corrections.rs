//! Curated station-name corrections for the NYC subway turnstile and station
//! reference datasets. Order matters; entries are `(matcher, replacement)`.

/// Exact rewrites applied to the turnstile `station` field.
pub const TURNSTILE_EXACT: &[(&str, &str)] = &[
    ("4AV-9 ST", "4 AV-9 ST"),
    ("TWENTY THIRD ST", "23 ST"),
    ("THIRTY THIRD ST", "33 ST"),
];

/// Substring patterns applied to station reference `stop_name`, in order.
pub const LOCATION_PATTERNS: &[(&str, &str)] = &[
    (" - ", "-"),
    ("CENTER", "CTR"),
    ("SQ-E TREMONT AV", "SQ"),
    (" UNIVERSITY", ""),
    ("PLAZA", "PZ"),
    ("COLLEGE", "COL"),
    ("STATION", "STA"),
];

/// Whole-name rewrites applied to station reference `stop_name` after the
/// patterns.
pub const LOCATION_EXACT: &[(&str, &str)] = &[
    ("103 ST-CORONA PZ", "103 ST-CORONA"),
    ("137 ST-CITY COL", "137 ST CITY COL"),
    ("138 ST-GRAND CONCOURSE", "138/GRAND CONC"),
    ("149 ST-GRAND CONCOURSE", "149/GRAND CONC"),
    ("15 ST-PROSPECT PK", "15 ST-PROSPECT"),
    ("161 ST-YANKEE STADIUM", "161/YANKEE STAD"),
    ("163 ST-AMSTERDAM AV", "163 ST-AMSTERDM"),
    ("21 ST-QUEENSBRIDGE", "21 ST-QNSBRIDGE"),
    ("3 AV-138 ST", "3 AV 138 ST"),
    ("40 ST", "40 ST LOWERY ST"),
    ("42 ST-PORT AUTHORITY BUS TERMINAL", "42 ST-PORT AUTH"),
    ("5 AV", "5 AVE"),
    ("59 ST-COLUMBUS CIRCLE", "59 ST COLUMBUS"),
    ("66 ST-LINCOLN CTR", "66 ST-LINCOLN"),
    ("68 ST-HUNTER COL", "68ST-HUNTER CO"),
    ("75 ST", "75 ST-ELDERTS"),
    ("81 ST-MUSEUM OF NATURAL HISTORY", "81 ST-MUSEUM"),
    ("82 ST-JACKSON HTS", "82 ST-JACKSON H"),
    ("85 ST-FOREST PKWY", "85 ST-FOREST PK"),
    ("90 ST-ELMHURST AV", "90 ST-ELMHURST"),
    ("9 ST", "9TH STREET"),
    ("AQUEDUCT-N CONDUIT AV", "AQUEDUCT N.COND"),
    ("AQUEDUCT RACETRACK", "AQUEDUCT RACETR"),
    ("ASTORIA-DITMARS BLVD", "ASTORIA DITMARS"),
    ("ATLANTIC AV-BARCLAYS CTR", "ATL AV-BARCLAY"),
    ("BEDFORD-NOSTRAND AVS", "BEDFORD-NOSTRAN"),
    ("BEVERLEY RD", "BEVERLEY ROAD"),
    ("BRIARWOOD-VAN WYCK BLVD", "BRIARWOOD"),
    ("BROADWAY-LAFAYETTE ST", "B'WAY-LAFAYETTE"),
    ("15 ST-PROSPECT PARK", "15 ST-PROSPECT"),
    ("47-50 STS CTR", "47-50 STS ROCK"),
    ("BEDFORD PARK BLVD", "BEDFORD PK BLVD"),
    ("BROOKLYN BRIDGE-CITY HALL", "BROOKLYN BRIDGE"),
    ("BUSHWICK AV-ABERDEEN ST", "BUSHWICK AV"),
    ("CANARSIE-ROCKAWAY PKWY", "CANARSIE-ROCKAW"),
    ("CENTRAL PARK NORTH (110 ST)", "CENTRAL PK N110"),
    ("CHRISTOPHER ST-SHERIDAN SQ", "CHRISTOPHER ST"),
    ("CLINTON-WASHINGTON AVS", "CLINTON-WASH AV"),
    ("CONEY ISLAND-STILLWELL AV", "CONEY IS-STILLW"),
    ("COURT ST", "COURT SQ-23 ST"),
    ("CROWN HTS-UTICA AV", "CROWN HTS-UTICA"),
    ("DELANCEY ST", "CROWN HTS-UTICA"),
    ("E 105 ST", "EAST 105 ST"),
    ("E 143 ST-ST MARY'S ST", "E 143/ST MARY'S"),
    ("EASTCHESTER-DYRE AV", "EASTCHSTER/DYRE"),
    ("EASTERN PKWY-BROOKLYN MUSEUM", "EASTN PKWY-MUSM"),
    ("FAR ROCKAWAY-MOTT AV", "FAR ROCKAWAY"),
    ("FLATBUSH AV-BROOKLYN COL", "FLATBUSH AV-B.C"),
    ("FLUSHING-MAIN ST", "FLUSHING-MAIN"),
    ("FOREST AV", "FOREST AVE"),
    ("FOREST HILLS-71 AV", "FOREST HILLS 71"),
    ("FORT HAMILTON PKWY", "FT HAMILTON PKY"),
    ("GRAND ARMY PZ", "GRAND ARMY PLAZ"),
    ("GRAND AV-NEWTOWN", "GRAND-NEWTOWN"),
    ("GRAND CENTRAL-42 ST", "GRD CNTRL-42 ST"),
    ("HARLEM-148 ST", "HARLEM 148 ST"),
    ("HOWARD BEACH-JFK AIRPORT", "HOWARD BCH JFK"),
    ("HOYT-SCHERMERHORN STS", "HOYT-SCHER"),
    ("HUNTERS POINT AV", "HUNTERS PT AV"),
    ("JAMAICA CTR-PARSONS/ARCHER", "JAMAICA CENTER"),
    ("JAMAICA-179 ST", "JAMAICA 179 ST"),
    ("JAMAICA-VAN WYCK", "JAMAICA VAN WK"),
    ("JAY ST-METROTECH", "JAY ST-METROTEC"),
    ("KEW GARDENS-UNION TPKE", "KEW GARDENS"),
    ("KINGSTON-THROOP AVS", "KINGSTON-THROOP"),
    ("KNICKERBOCKER AV", "KNICKERBOCKER"),
    ("LEXINGTON AV/53 ST", "LEXINGTON AV/53"),
    ("LEXINGTON AV/63 ST", "LEXINGTON AV/63"),
    ("MARBLE HILL-225 ST", "MARBLE HILL-225"),
    ("METS-WILLETS POINT", "METS-WILLETS PT"),
    ("MORRISON AV- SOUND VIEW", "MORISN AV/SNDVW"),
    ("MYRTLE-WILLOUGHBY AVS", "MYRTLE-WILLOUGH"),
    ("MYRTLE-WYCKOFF AVS", "MYRTLE-WYCKOFF"),
    ("NORWOOD-205 ST", "NORWOOD 205 ST"),
    ("OZONE PARK-LEFFERTS BLVD", "OZONE PK LEFFRT"),
    ("PARK PL", "PARK PLACE"),
    ("QUEENS PZ", "QUEENS PLAZA"),
    ("ROCKAWAY PARK-BEACH 116 ST", "ROCKAWAY PARK B"),
    ("ROOSEVELT ISLAND", "ROOSEVELT ISLND"),
    ("SENECA AV", "SENECA AVE"),
    ("SMITH-9 STS", "SMITH-9 ST"),
    ("ST GEORGE", "ST. GEORGE"),
    ("VAN CORTLANDT PARK-242 ST", "V.CORTLANDT PK"),
    ("VERNON BLVD-JACKSON AV", "VERNON-JACKSON"),
    ("W 4 ST", "W 4 ST-WASH SQ"),
    ("W 8 ST-NY AQUARIUM", "W 8 ST-AQUARIUM"),
    ("WAKEFIELD-241 ST", "WAKEFIELD/241"),
    ("WTC CORTLANDT", "WTC-CORTLANDT"),
    ("4 AV", "4 AV-9 ST"),
    ("ESSEX ST", "DELANCEY/ESSEX"),
    ("JACKSON HTS-ROOSEVELT AV", "JKSN HT-ROOSVLT"),
    ("NEWKIRK PZ", "NEWKIRK PLAZA"),
    ("QUEENSBORO PZ", "QUEENSBORO PLZ"),
    ("SUTPHIN BLVD-ARCHER AV-JFK AIRPORT", "SUTPHIN-ARCHER"),
    ("SUTTER AV-RUTLAND RD", "SUTTER AV-RUTLD"),
    ("UNION SQ-14 ST", "14TH STREET"),
    ("WHITEHALL ST", "WHITEHALL S-FRY"),
    ("WOODSIDE-61 ST", "61 ST WOODSIDE"),
    ("34 ST-11 AV", "34 ST-HUDSON YD"),
    ("JAMAICA CTR", "JAMAICA CENTER"),
    ("47-50 STS-ROCKEFELLER CTR", "47-50 STS ROCK"),
    ("WEST FARMS SQ-E TREMONT AV", "WEST FARMS SQ"),
    ("WESTCHESTER SQ-E TREMONT AV", "WESTCHESTER SQ"),
];
